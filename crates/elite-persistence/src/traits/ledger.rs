//! Ledger persistence trait
//!
//! Every balance change is written together with the transaction row that
//! explains it. Postings that would take an account below zero abort the whole
//! write with `EliteError::InsufficientFunds`.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::{
    NewTransaction, Page, Posting, TransactionInfo, TransactionQuery, TransactionStatus,
    TransactionSummary,
};

#[async_trait]
pub trait LedgerPersistence: Send + Sync {
    /// Atomically apply `postings` and insert `transaction`
    async fn ledger_post(
        &self,
        transaction: NewTransaction,
        postings: &[Posting],
    ) -> anyhow::Result<TransactionInfo>;

    /// Atomically move a pending transaction to `status`, stamp `processed_at`
    /// and apply `postings`. Fails with `EliteError::Conflict` when the
    /// transaction is no longer pending.
    async fn ledger_settle(
        &self,
        id: i64,
        status: TransactionStatus,
        postings: &[Posting],
    ) -> anyhow::Result<TransactionInfo>;

    async fn transaction_find_by_id(&self, id: i64) -> anyhow::Result<Option<TransactionInfo>>;

    async fn transaction_find_by_reference(
        &self,
        reference: &str,
    ) -> anyhow::Result<Option<TransactionInfo>>;

    /// Transactions matching `query`, newest first
    async fn transaction_find_page(
        &self,
        query: &TransactionQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<TransactionInfo>>;

    async fn transaction_summary(&self, query: &TransactionQuery)
    -> anyhow::Result<TransactionSummary>;

    /// Transactions created at or after `since`, oldest first
    async fn transaction_find_since(
        &self,
        since: NaiveDateTime,
    ) -> anyhow::Result<Vec<TransactionInfo>>;
}
