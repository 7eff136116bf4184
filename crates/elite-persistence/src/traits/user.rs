//! User persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::{NewUser, Page, UserInfo, UserPatch, UserQuery};

#[async_trait]
pub trait UserPersistence: Send + Sync {
    async fn user_find_by_id(&self, id: i64) -> anyhow::Result<Option<UserInfo>>;

    /// Lookup by normalized (lowercase) email
    async fn user_find_by_email(&self, email: &str) -> anyhow::Result<Option<UserInfo>>;

    /// Create a user; fails with `EliteError::Conflict` when the email is taken
    async fn user_create(&self, user: NewUser) -> anyhow::Result<UserInfo>;

    /// Write only the fields set in `patch`, bump `updated_at` and return the
    /// stored row. Fails with `EliteError::NotFound` for an unknown id and with
    /// `EliteError::Conflict` when the new email belongs to another user.
    async fn user_update(&self, id: i64, patch: &UserPatch) -> anyhow::Result<UserInfo>;

    /// Delete a user with their PIN, OTPs, withdrawal accounts and empty
    /// money accounts. Refuses with `EliteError::Conflict` while any account
    /// still holds a balance. Returns false when the user does not exist.
    async fn user_delete(&self, id: i64) -> anyhow::Result<bool>;

    /// Users matching `query`, newest first
    async fn user_find_page(
        &self,
        query: &UserQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<UserInfo>>;

    async fn user_count(&self, query: &UserQuery) -> anyhow::Result<u64>;

    /// Creation times of users registered at or after `since`
    async fn user_created_since(&self, since: NaiveDateTime) -> anyhow::Result<Vec<NaiveDateTime>>;
}
