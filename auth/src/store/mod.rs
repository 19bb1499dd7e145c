pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use weblog_models::auth::User;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence seam for user records. The auth module only reads and creates
/// users; everything else about the user table belongs to the host app.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Creates a local user. Fails with `DuplicateUsername` if the name is
    /// taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: Option<String>,
        roles: &[String],
    ) -> Result<User>;

    /// Create-or-reuse for federated logins. Concurrent first-time logins
    /// with the same username must resolve to a single record: backed by a
    /// unique constraint in Postgres and a write lock in memory.
    async fn find_or_create_by_username(&self, username: &str) -> Result<User>;

    async fn update_last_login(&self, id: Uuid) -> Result<()>;

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>>;

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<()>;
}
