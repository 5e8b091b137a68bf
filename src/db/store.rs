use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::User;
use crate::Result;

/// Credential store used by the auth core.
///
/// `save` is an upsert keyed by `User::id`; a second account with an email
/// that already belongs to another id must fail with `DatabaseError::Duplicate`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn save(&self, user: &User) -> Result<()>;

    /// Overwrites only the refresh slot. Returns `false` if the user is gone.
    async fn set_refresh_token(&self, id: Uuid, token: Option<String>) -> Result<bool>;

    /// Replaces the refresh slot only if it still holds `current`.
    ///
    /// Returns `false` when another writer got there first or the user is gone.
    /// This is the single-document compare-and-set that makes rotation race free.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        current: Option<String>,
        next: Option<String>,
    ) -> Result<bool>;

    async fn close(&self) {}
}
