use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::store::UserStore;
use crate::error::DatabaseError;
use crate::Result;

/// Process-local store. Every operation runs under one lock, so each call is
/// atomic with respect to the others.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Removes an account outright; used to model a deleted subject.
    pub async fn remove(&self, id: Uuid) -> Option<User> {
        self.users.write().await.remove(&id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn save(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(DatabaseError::Duplicate.into());
        }

        let mut stored = user.clone();
        stored.updated_at = Utc::now();
        users.insert(stored.id, stored);
        Ok(())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<String>) -> Result<bool> {
        let mut users = self.users.write().await;

        match users.get_mut(&id) {
            Some(user) => {
                user.refresh_token = token;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        current: Option<String>,
        next: Option<String>,
    ) -> Result<bool> {
        let mut users = self.users.write().await;

        match users.get_mut(&id) {
            Some(user) if user.refresh_token == current => {
                user.refresh_token = next;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::AppError;

    fn user(email: &str) -> User {
        User::new(email.to_string(), "hash".to_string(), Role::Student, "Test".to_string())
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let store = MemoryUserStore::new();
        let u = user("a@b.com");
        store.save(&u).await.unwrap();

        assert_eq!(store.find_by_id(u.id).await.unwrap().unwrap().email, "a@b.com");
        assert_eq!(store.find_by_email("a@b.com").await.unwrap().unwrap().id, u.id);
        assert!(store.find_by_email("A@B.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let store = MemoryUserStore::new();
        let mut u = user("a@b.com");
        store.save(&u).await.unwrap();

        u.full_name = "Renamed".to_string();
        store.save(&u).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.find_by_id(u.id).await.unwrap().unwrap().full_name, "Renamed");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryUserStore::new();
        store.save(&user("a@b.com")).await.unwrap();

        let err = store.save(&user("a@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::Duplicate)));
    }

    #[tokio::test]
    async fn test_swap_refresh_token_compares_current_value() {
        let store = MemoryUserStore::new();
        let u = user("a@b.com");
        store.save(&u).await.unwrap();

        assert!(store.swap_refresh_token(u.id, None, Some("one".into())).await.unwrap());
        assert!(!store.swap_refresh_token(u.id, None, Some("two".into())).await.unwrap());
        assert!(store.swap_refresh_token(u.id, Some("one".into()), Some("two".into())).await.unwrap());

        let stored = store.find_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("two"));

        assert!(!store.swap_refresh_token(Uuid::new_v4(), None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_refresh_token_touches_only_the_slot() {
        let store = MemoryUserStore::new();
        let u = user("a@b.com");
        store.save(&u).await.unwrap();

        assert!(store.set_refresh_token(u.id, Some("r1".into())).await.unwrap());
        let stored = store.find_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("r1"));
        assert_eq!(stored.full_name, u.full_name);

        assert!(store.set_refresh_token(u.id, None).await.unwrap());
        assert!(store.find_by_id(u.id).await.unwrap().unwrap().refresh_token.is_none());

        assert!(!store.set_refresh_token(Uuid::new_v4(), None).await.unwrap());
    }
}
