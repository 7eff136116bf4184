// Liveness endpoints polled by the container runtime

use actix_web::{HttpResponse, get, web};
use chrono::Utc;
use elite_common::{PROJECT_NAME, SERVICE_NAME, VERSION};
use serde::Serialize;

use crate::model::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: &'static str,
    pub uploads: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub version: &'static str,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Checks storage and the upload directories
pub async fn check(data: &AppState) -> HealthReport {
    let database_ok = match data.persistence.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            false
        }
    };
    let uploads_ok = data.uploads.dirs_ready();

    HealthReport {
        status: if database_ok && uploads_ok {
            "healthy"
        } else {
            "unhealthy"
        },
        database: if database_ok {
            "connected"
        } else {
            "disconnected"
        },
        uploads: if uploads_ok { "ready" } else { "missing" },
        timestamp: Utc::now().to_rfc3339(),
        service: SERVICE_NAME,
        version: VERSION,
    }
}

/// The report is returned bare, outside the response envelope, so health checkers
/// and load balancers can read it directly.
#[get("/health")]
async fn health(data: web::Data<AppState>) -> HttpResponse {
    let report = check(&data).await;
    if report.is_healthy() {
        HttpResponse::Ok().json(report)
    } else {
        HttpResponse::ServiceUnavailable().json(report)
    }
}

#[get("/")]
async fn root() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": PROJECT_NAME,
        "status": "operational",
        "version": VERSION,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Root level routes; they live outside any scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(root);
}
