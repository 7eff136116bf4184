//! User administration
//!
//! Suspension, activation, deletion, credential resets and exports performed
//! by administrators. Every mutation appends an audit entry with the acting
//! admin as actor.

use std::{collections::BTreeMap, str::FromStr, sync::Arc};

use chrono::NaiveDateTime;
use elite_auth::{Notifier, service::password};
use elite_common::{
    EliteError,
    utils::{normalize_email, utc_now},
    validation::{message_of, validate_email, validate_password_strength, validate_phone},
};
use elite_persistence::{KycStatus, Page, PersistenceService, UserInfo, UserPatch, UserQuery};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::audit::{self, AuditService};

pub const DEFAULT_SUSPENSION_REASON: &str = "Administrative action";
const EXPORT_BATCH_SIZE: u64 = 100;

/// Public shape of a user, without credentials
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_admin: bool,
    pub kyc_status: KycStatus,
    pub kyc_submitted_at: Option<NaiveDateTime>,
    pub kyc_verified_at: Option<NaiveDateTime>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub profile_image: Option<String>,
    pub language_preference: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<&UserInfo> for UserView {
    fn from(user: &UserInfo) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            is_active: user.is_active,
            is_verified: user.is_verified,
            is_admin: user.is_admin,
            kyc_status: user.kyc_status,
            kyc_submitted_at: user.kyc_submitted_at,
            kyc_verified_at: user.kyc_verified_at,
            date_of_birth: user.date_of_birth.clone(),
            address: user.address.clone(),
            city: user.city.clone(),
            state: user.state.clone(),
            country: user.country.clone(),
            postal_code: user.postal_code.clone(),
            profile_image: user.profile_image.clone(),
            language_preference: user.language_preference.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserInfo> for UserView {
    fn from(user: UserInfo) -> Self {
        UserView::from(&user)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Suspend,
    Activate,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub message: String,
    pub processed: u64,
    pub failed: u64,
    pub details: BTreeMap<String, String>,
}

/// Which users an export contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportType {
    All,
    Active,
    PendingKyc,
    Suspended,
}

impl ExportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportType::All => "all",
            ExportType::Active => "active",
            ExportType::PendingKyc => "pending_kyc",
            ExportType::Suspended => "suspended",
        }
    }

    fn query(self) -> UserQuery {
        match self {
            ExportType::All => UserQuery::default(),
            ExportType::Active => UserQuery {
                is_active: Some(true),
                ..Default::default()
            },
            ExportType::PendingKyc => UserQuery {
                kyc_status: Some(KycStatus::Submitted),
                ..Default::default()
            },
            ExportType::Suspended => UserQuery {
                is_active: Some(false),
                ..Default::default()
            },
        }
    }
}

impl FromStr for ExportType {
    type Err = EliteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ExportType::All),
            "active" => Ok(ExportType::Active),
            "pending_kyc" => Ok(ExportType::PendingKyc),
            "suspended" => Ok(ExportType::Suspended),
            _ => Err(EliteError::IllegalArgument(
                "Invalid export type. Allowed: all, active, pending_kyc, suspended".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = EliteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(EliteError::IllegalArgument(
                "Invalid export format. Allowed: json, csv".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub kyc_status: KycStatus,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserExport {
    pub format: &'static str,
    pub filename: String,
    pub record_count: usize,
    pub data: serde_json::Value,
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::from("id,email,first_name,last_name,phone,kyc_status,is_active,created_at\n");
    for row in rows {
        let fields = [
            row.id.to_string(),
            csv_field(&row.email),
            csv_field(&row.first_name),
            csv_field(&row.last_name),
            csv_field(row.phone.as_deref().unwrap_or_default()),
            row.kyc_status.to_string(),
            row.is_active.to_string(),
            row.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

#[derive(Clone)]
pub struct UserAdminService {
    persistence: Arc<dyn PersistenceService>,
    notifier: Arc<dyn Notifier>,
    audit: AuditService,
}

impl UserAdminService {
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        notifier: Arc<dyn Notifier>,
        audit: AuditService,
    ) -> Self {
        Self {
            persistence,
            notifier,
            audit,
        }
    }

    async fn find(&self, user_id: i64) -> anyhow::Result<UserInfo> {
        self.persistence
            .user_find_by_id(user_id)
            .await?
            .ok_or_else(|| EliteError::NotFound("User".to_string()).into())
    }

    async fn set_active(&self, user_id: i64, active: bool) -> anyhow::Result<UserInfo> {
        let patch = UserPatch {
            is_active: Some(active),
            ..Default::default()
        };
        self.persistence.user_update(user_id, &patch).await
    }

    fn ensure_not_self(admin: &UserInfo, user_id: i64, what: &str) -> Result<(), EliteError> {
        if admin.id == user_id {
            return Err(EliteError::IllegalArgument(format!("You cannot {} your own account", what)));
        }
        Ok(())
    }

    pub async fn list(&self, query: &UserQuery, page_no: u64, page_size: u64) -> anyhow::Result<Page<UserView>> {
        Ok(self
            .persistence
            .user_find_page(query, page_no, page_size)
            .await?
            .map(UserView::from))
    }

    pub async fn suspend(&self, admin: &UserInfo, user_id: i64, reason: Option<&str>) -> anyhow::Result<UserInfo> {
        Self::ensure_not_self(admin, user_id, "suspend")?;
        let user = self.find(user_id).await?;
        if !user.is_active {
            return Err(EliteError::IllegalArgument("User is already suspended".to_string()).into());
        }
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_SUSPENSION_REASON);

        let user = self.set_active(user.id, false).await?;

        self.audit
            .record(
                Some(admin.id),
                audit::ACTION_USER_SUSPENDED,
                json!({ "user_id": user.id, "user_email": user.email, "reason": reason }),
            )
            .await;
        if let Err(e) = self
            .notifier
            .send_notice(&user.email, "Account suspended", reason)
            .await
        {
            tracing::warn!(user_id = user.id, error = %e, "Failed to send suspension notice");
        }
        tracing::info!(admin_id = admin.id, user_id = user.id, reason, "User suspended");
        Ok(user)
    }

    pub async fn activate(&self, admin: &UserInfo, user_id: i64) -> anyhow::Result<UserInfo> {
        let user = self.find(user_id).await?;
        if user.is_active {
            return Err(EliteError::IllegalArgument("User is already active".to_string()).into());
        }
        let user = self.set_active(user.id, true).await?;

        self.audit
            .record(
                Some(admin.id),
                audit::ACTION_USER_ACTIVATED,
                json!({ "user_id": user.id, "user_email": user.email }),
            )
            .await;
        tracing::info!(admin_id = admin.id, user_id = user.id, "User activated");
        Ok(user)
    }

    /// Delete a user and everything they own. Refused while a balance remains.
    pub async fn delete(&self, admin: &UserInfo, user_id: i64) -> anyhow::Result<String> {
        Self::ensure_not_self(admin, user_id, "delete")?;
        let user = self.find(user_id).await?;
        if !self.persistence.user_delete(user_id).await? {
            return Err(EliteError::NotFound("User".to_string()).into());
        }

        self.audit
            .record(
                Some(admin.id),
                audit::ACTION_USER_DELETED,
                json!({ "deleted_user_id": user_id, "deleted_user_email": user.email }),
            )
            .await;
        tracing::info!(admin_id = admin.id, user_id, "User deleted");
        Ok(user.email)
    }

    pub async fn reset_password(&self, admin: &UserInfo, user_id: i64, new_password: &str) -> anyhow::Result<UserInfo> {
        validate_password_strength(new_password)
            .map_err(|e| EliteError::IllegalArgument(message_of(&e)))?;
        self.find(user_id).await?;
        let patch = UserPatch {
            password_hash: Some(password::hash_secret(new_password)?),
            last_password_change: Some(Some(utc_now())),
            ..Default::default()
        };
        let user = self.persistence.user_update(user_id, &patch).await?;

        self.audit
            .record(
                Some(admin.id),
                audit::ACTION_PASSWORD_RESET,
                json!({ "user_id": user.id, "user_email": user.email }),
            )
            .await;
        Ok(user)
    }

    /// Change contact details. Only supplied fields are touched; the audit
    /// entry records old and new values.
    pub async fn update_details(
        &self,
        admin: &UserInfo,
        user_id: i64,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> anyhow::Result<UserInfo> {
        let user = self.find(user_id).await?;
        let mut changes = serde_json::Map::new();
        let mut patch = UserPatch::default();

        if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
            validate_email(email).map_err(|_| EliteError::IllegalArgument("Invalid email format".to_string()))?;
            let email = normalize_email(email);
            changes.insert("old_email".to_string(), json!(user.email));
            changes.insert("new_email".to_string(), json!(email));
            patch.email = Some(email);
        }
        if let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) {
            validate_phone(phone).map_err(|e| EliteError::IllegalArgument(message_of(&e)))?;
            changes.insert("old_phone".to_string(), json!(user.phone));
            changes.insert("new_phone".to_string(), json!(phone));
            patch.phone = Some(Some(phone.to_string()));
        }

        if changes.is_empty() {
            return Ok(user);
        }

        let user = self.persistence.user_update(user_id, &patch).await?;
        self.audit
            .record(
                Some(admin.id),
                audit::ACTION_USER_UPDATED,
                json!({ "user_id": user.id, "changes": changes }),
            )
            .await;
        Ok(user)
    }

    /// Apply one action to many users, reporting the outcome per id
    pub async fn bulk(
        &self,
        admin: &UserInfo,
        user_ids: &[i64],
        action: BulkAction,
        reason: Option<&str>,
    ) -> anyhow::Result<BulkOutcome> {
        let mut outcome = BulkOutcome::default();

        for &user_id in user_ids {
            let result = match action {
                BulkAction::Suspend => self.suspend(admin, user_id, reason).await.map(|_| "Suspended"),
                BulkAction::Activate => self.activate(admin, user_id).await.map(|_| "Activated"),
                BulkAction::Delete => self.delete(admin, user_id).await.map(|_| "Deleted"),
            };
            match result {
                Ok(status) => {
                    outcome.processed += 1;
                    outcome.details.insert(user_id.to_string(), status.to_string());
                }
                Err(e) => {
                    outcome.failed += 1;
                    let detail = match e.downcast_ref::<EliteError>() {
                        Some(EliteError::NotFound(_)) => "User not found".to_string(),
                        Some(err) => err.to_string(),
                        None => format!("Error: {}", e),
                    };
                    outcome.details.insert(user_id.to_string(), detail);
                }
            }
        }

        outcome.message = format!(
            "Bulk action completed: {} processed, {} failed",
            outcome.processed, outcome.failed
        );
        self.audit
            .record(
                Some(admin.id),
                audit::ACTION_BULK_USER_ACTION,
                json!({
                    "action": action,
                    "processed": outcome.processed,
                    "failed": outcome.failed,
                    "reason": reason,
                }),
            )
            .await;
        Ok(outcome)
    }

    pub async fn export(
        &self,
        admin: &UserInfo,
        export_type: ExportType,
        format: ExportFormat,
    ) -> anyhow::Result<UserExport> {
        let query = export_type.query();
        let mut rows = Vec::new();
        let mut page_no = 1;
        loop {
            let page = self
                .persistence
                .user_find_page(&query, page_no, EXPORT_BATCH_SIZE)
                .await?;
            let done = page_no >= page.pages_available;
            rows.extend(page.page_items.into_iter().map(|u| ExportRow {
                id: u.id,
                email: u.email,
                first_name: u.first_name,
                last_name: u.last_name,
                phone: u.phone,
                kyc_status: u.kyc_status,
                is_active: u.is_active,
                created_at: u.created_at,
            }));
            if done {
                break;
            }
            page_no += 1;
        }

        let stamp = utc_now().format("%Y%m%d_%H%M%S");
        let (format_name, data) = match format {
            ExportFormat::Json => ("json", serde_json::to_value(&rows)?),
            ExportFormat::Csv => ("csv", json!(render_csv(&rows))),
        };

        self.audit
            .record(
                Some(admin.id),
                audit::ACTION_USERS_EXPORTED,
                json!({
                    "export_type": export_type.as_str(),
                    "format": format_name,
                    "record_count": rows.len(),
                }),
            )
            .await;

        Ok(UserExport {
            format: format_name,
            filename: format!("users_export_{}_{}.{}", export_type.as_str(), stamp, format_name),
            record_count: rows.len(),
            data,
        })
    }
}
