// Audit trail, dashboard and runtime health

use actix_web::{HttpResponse, get, web};
use elite_common::utils::normalize_page;
use elite_persistence::{AuditLogInfo, AuditLogQuery, Page};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    api::{health, model::parse_date_bound},
    error::AppError,
    model::{AppState, response},
    secured::AdminUser,
    service::{analytics::Dashboard, audit},
};

#[derive(Debug, Deserialize)]
pub struct AuditLogParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub action: Option<String>,
    pub actor_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemHealth {
    pub status: &'static str,
    pub database: bool,
    pub uploads: bool,
    pub metrics_enabled: bool,
    pub version: &'static str,
    pub last_updated: String,
}

#[get("/audit-logs")]
pub async fn audit_logs(
    _admin: AdminUser,
    data: web::Data<AppState>,
    params: web::Query<AuditLogParams>,
) -> Result<HttpResponse, AppError> {
    let query = AuditLogQuery {
        action: params
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from),
        actor_id: params.actor_id,
        start: parse_date_bound("start_date", params.start_date.as_deref(), false)?,
        end: parse_date_bound("end_date", params.end_date.as_deref(), true)?,
    };
    let (page_no, page_size) = normalize_page(params.page, params.page_size);

    let page = data.audit.list(&query, page_no, page_size).await?;
    Ok(response::Result::<Page<AuditLogInfo>>::http_success(page))
}

#[get("/analytics/dashboard")]
pub async fn dashboard(admin: AdminUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let dashboard = data.analytics.dashboard().await?;
    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_ANALYTICS_ACCESSED,
            json!({ "endpoint": "dashboard" }),
        )
        .await;
    Ok(response::Result::<Dashboard>::http_success(dashboard))
}

#[get("/system/health")]
pub async fn system_health(_admin: AdminUser, data: web::Data<AppState>) -> HttpResponse {
    let report = health::check(&data).await;
    response::Result::<SystemHealth>::http_success(SystemHealth {
        status: if report.is_healthy() {
            "healthy"
        } else {
            "degraded"
        },
        database: report.database == "connected",
        uploads: report.uploads == "ready",
        metrics_enabled: data.metrics_handle.is_some(),
        version: report.version,
        last_updated: report.timestamp,
    })
}
