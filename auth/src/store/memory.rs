//! In-memory user store for development and testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use weblog_models::auth::User;

use super::{Result, StoreError, UserStore};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pre-built user, replacing any record with the same id.
    pub async fn seed(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    fn build_user(username: &str, password_hash: Option<String>, roles: &[String]) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            roles: roles.to_vec(),
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).filter(|u| u.is_active).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.username == username && u.is_active)
            .cloned())
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: Option<String>,
        roles: &[String],
    ) -> Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername);
        }

        let user = Self::build_user(username, password_hash, roles);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_or_create_by_username(&self, username: &str) -> Result<User> {
        // The write lock is held across lookup and insert, so two concurrent
        // first-time logins cannot both create a record.
        let mut users = self.users.write().await;
        if let Some(existing) = users.values().find(|u| u.username == username) {
            return Ok(existing.clone());
        }

        let user = Self::build_user(username, None, &[]);
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        let now = Utc::now();
        user.last_login_at = Some(now);
        user.updated_at = now;
        Ok(())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().filter(|u| u.is_active).cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_or_create_reuses_existing_record() {
        let store = MemoryUserStore::new();
        let first = store.find_or_create_by_username("jdoe").await.unwrap();
        let second = store.find_or_create_by_username("jdoe").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_username() {
        let store = MemoryUserStore::new();
        store.create_user("jdoe", None, &[]).await.unwrap();

        let err = store.create_user("jdoe", None, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[tokio::test]
    async fn concurrent_federated_logins_create_one_record() {
        let store = std::sync::Arc::new(MemoryUserStore::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.find_or_create_by_username("race").await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }

        ids.dedup();
        assert_eq!(store.user_count().await, 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
