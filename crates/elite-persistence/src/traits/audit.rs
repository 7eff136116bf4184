//! Audit log persistence trait

use async_trait::async_trait;

use crate::model::{AuditLogInfo, AuditLogQuery, NewAuditLog, Page};

#[async_trait]
pub trait AuditPersistence: Send + Sync {
    async fn audit_log_create(&self, log: NewAuditLog) -> anyhow::Result<AuditLogInfo>;

    /// Entries matching `query`, newest first
    async fn audit_log_find_page(
        &self,
        query: &AuditLogQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<AuditLogInfo>>;
}
