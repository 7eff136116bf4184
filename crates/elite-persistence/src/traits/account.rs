//! Account persistence trait

use async_trait::async_trait;

use crate::model::{AccountInfo, NewAccount};

#[async_trait]
pub trait AccountPersistence: Send + Sync {
    /// Open an account with a zero balance; fails with `EliteError::Conflict`
    /// when the account number is already taken
    async fn account_create(&self, account: NewAccount) -> anyhow::Result<AccountInfo>;

    async fn account_find_by_id(&self, id: i64) -> anyhow::Result<Option<AccountInfo>>;

    async fn account_find_by_number(&self, account_number: &str)
    -> anyhow::Result<Option<AccountInfo>>;

    /// Accounts of a user, oldest first
    async fn account_find_by_user(&self, user_id: i64) -> anyhow::Result<Vec<AccountInfo>>;
}
