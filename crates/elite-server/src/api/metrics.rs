// Prometheus scrape endpoint

use actix_web::{HttpResponse, get, web};

use crate::model::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[get("/metrics")]
async fn metrics(data: web::Data<AppState>) -> HttpResponse {
    match &data.metrics_handle {
        Some(handle) => HttpResponse::Ok()
            .content_type(PROMETHEUS_CONTENT_TYPE)
            .body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(metrics);
}
