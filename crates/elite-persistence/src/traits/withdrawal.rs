//! Withdrawal account persistence trait

use async_trait::async_trait;

use crate::model::{NewWithdrawalAccount, WithdrawalAccountInfo};

#[async_trait]
pub trait WithdrawalAccountPersistence: Send + Sync {
    /// Create a payout destination. The first one of a user becomes default,
    /// as does any created with `make_default`.
    async fn withdrawal_account_create(
        &self,
        account: NewWithdrawalAccount,
        make_default: bool,
    ) -> anyhow::Result<WithdrawalAccountInfo>;

    async fn withdrawal_account_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<WithdrawalAccountInfo>>;

    /// Accounts of a user, default first then newest first
    async fn withdrawal_account_find_by_user(
        &self,
        user_id: i64,
    ) -> anyhow::Result<Vec<WithdrawalAccountInfo>>;

    /// Persist the descriptive fields; the default flag is left untouched
    async fn withdrawal_account_save(
        &self,
        account: &WithdrawalAccountInfo,
    ) -> anyhow::Result<WithdrawalAccountInfo>;

    /// Delete an account. When it was the default, the newest remaining
    /// account of the user is promoted.
    async fn withdrawal_account_delete(&self, id: i64) -> anyhow::Result<bool>;

    /// Make `id` the only default account of `user_id`
    async fn withdrawal_account_set_default(
        &self,
        user_id: i64,
        id: i64,
    ) -> anyhow::Result<WithdrawalAccountInfo>;
}
