use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use async_trait::async_trait;

use weblog_models::auth::User;

use super::{Result, StoreError, UserStore};

/// Postgres error code for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        err.as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == UNIQUE_VIOLATION)
            .unwrap_or(false)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 AND is_active = true",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: Option<String>,
        roles: &[String],
    ) -> Result<User> {
        let now = Utc::now();

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, username, password_hash, roles, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, true, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(roles)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => {
                tracing::info!("Created user {} ({})", user.username, user.id);
                Ok(user)
            }
            Err(e) if Self::is_unique_violation(&e) => Err(StoreError::DuplicateUsername),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_or_create_by_username(&self, username: &str) -> Result<User> {
        let now = Utc::now();

        // The unique constraint on username makes the insert race-safe: the
        // loser of a concurrent first-time login gets no row back and falls
        // through to the select.
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, username, password_hash, roles, is_active, created_at, updated_at
            ) VALUES ($1, $2, NULL, '{}', true, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user) = inserted {
            tracing::info!("Created user {} ({}) via federated login", user.username, user.id);
            return Ok(user);
        }

        self.find_by_username(username)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login_at = $1, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE is_active = true
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1 as test").fetch_one(&self.pool).await?;
        Ok(())
    }
}
