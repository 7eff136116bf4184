// Audit trail of administrative actions

use std::sync::Arc;

use elite_persistence::{AuditLogInfo, AuditLogQuery, NewAuditLog, Page, PersistenceService};

pub const ACTION_ADMIN_REGISTERED: &str = "admin_registered";
pub const ACTION_ADMIN_LOGIN: &str = "admin_login";
pub const ACTION_ADMIN_LOGOUT: &str = "admin_logout";
pub const ACTION_USER_SUSPENDED: &str = "user_suspended";
pub const ACTION_USER_ACTIVATED: &str = "user_activated";
pub const ACTION_USER_DELETED: &str = "user_deleted";
pub const ACTION_USER_UPDATED: &str = "user_details_updated";
pub const ACTION_PASSWORD_RESET: &str = "user_password_reset";
pub const ACTION_BULK_USER_ACTION: &str = "bulk_user_action";
pub const ACTION_USERS_EXPORTED: &str = "users_data_exported";
pub const ACTION_KYC_REVIEWED: &str = "kyc_reviewed";
pub const ACTION_KYC_DOCS_REQUESTED: &str = "kyc_additional_docs_requested";
pub const ACTION_TRANSACTION_APPROVED: &str = "transaction_approved";
pub const ACTION_TRANSACTION_REJECTED: &str = "transaction_rejected";
pub const ACTION_ANALYTICS_ACCESSED: &str = "analytics_accessed";

#[derive(Clone)]
pub struct AuditService {
    persistence: Arc<dyn PersistenceService>,
}

impl AuditService {
    pub fn new(persistence: Arc<dyn PersistenceService>) -> Self {
        Self { persistence }
    }

    /// Append an entry. A failed write is logged and does not fail the
    /// action being audited.
    pub async fn record(&self, actor_id: Option<i64>, action: &str, details: serde_json::Value) {
        let result = self
            .persistence
            .audit_log_create(NewAuditLog {
                actor_id,
                action: action.to_string(),
                details,
            })
            .await;

        match result {
            Ok(log) => {
                tracing::info!(actor_id = ?actor_id, action, log_id = log.id, "Audit entry recorded");
                metrics::counter!("elite_audit_entries_total", "action" => action.to_string()).increment(1);
            }
            Err(e) => tracing::error!(actor_id = ?actor_id, action, error = %e, "Failed to record audit entry"),
        }
    }

    pub async fn list(
        &self,
        query: &AuditLogQuery,
        page_no: u64,
        page_size: u64,
    ) -> anyhow::Result<Page<AuditLogInfo>> {
        self.persistence
            .audit_log_find_page(query, page_no, page_size)
            .await
    }
}

#[cfg(test)]
mod tests {
    use elite_persistence::EmbeddedPersistService;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_record_and_filter() {
        let dir = TempDir::new().unwrap();
        let persistence: Arc<dyn PersistenceService> =
            Arc::new(EmbeddedPersistService::open(dir.path()).unwrap());
        let audit = AuditService::new(persistence);

        audit.record(Some(1), ACTION_USER_SUSPENDED, json!({"user_id": 5})).await;
        audit.record(Some(1), ACTION_USER_ACTIVATED, json!({"user_id": 5})).await;
        audit.record(Some(2), ACTION_USER_SUSPENDED, json!({"user_id": 6})).await;

        let all = audit.list(&AuditLogQuery::default(), 1, 20).await.unwrap();
        assert_eq!(all.total_count, 3);

        let suspended = audit
            .list(
                &AuditLogQuery {
                    action: Some(ACTION_USER_SUSPENDED.to_string()),
                    ..Default::default()
                },
                1,
                20,
            )
            .await
            .unwrap();
        assert_eq!(suspended.total_count, 2);

        let by_actor = audit
            .list(
                &AuditLogQuery {
                    actor_id: Some(2),
                    ..Default::default()
                },
                1,
                20,
            )
            .await
            .unwrap();
        assert_eq!(by_actor.total_count, 1);
        assert_eq!(by_actor.page_items[0].details["user_id"], 6);
    }
}
