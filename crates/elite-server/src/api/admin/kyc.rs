// KYC review queue

use actix_web::{HttpResponse, get, post, web};
use elite_common::EliteError;
use elite_persistence::{KycStatus, Page};
use serde::Deserialize;
use serde_json::json;

use crate::{
    api::model::PageParams,
    error::AppError,
    model::{AppState, response},
    secured::AdminUser,
    service::{
        audit,
        kyc::{DEFAULT_DEADLINE_DAYS, KycStatusView, PendingApplication},
    },
};

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub user_id: i64,
    pub status: KycStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdditionalDocsRequest {
    pub user_id: i64,
    pub required_documents: Vec<String>,
    pub reason: String,
    pub deadline_days: Option<i64>,
}

#[get("/pending")]
pub async fn pending(
    _admin: AdminUser,
    data: web::Data<AppState>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, AppError> {
    let (page_no, page_size) = params.normalized();
    let page = data.kyc.pending(page_no, page_size).await?;
    Ok(response::Result::<Page<PendingApplication>>::http_success(page))
}

#[post("/review")]
pub async fn review(
    admin: AdminUser,
    data: web::Data<AppState>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let user = data
        .kyc
        .review(body.user_id, body.status, body.rejection_reason.as_deref())
        .await?;

    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_KYC_REVIEWED,
            json!({
                "user_id": user.id,
                "status": user.kyc_status,
                "rejection_reason": user.kyc_rejection_reason,
            }),
        )
        .await;

    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": format!("KYC {} for user {}", user.kyc_status, user.email),
        "kyc_status": user.kyc_status,
    })))
}

#[get("/users/{id}/kyc-status")]
pub async fn user_status(
    _admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = data
        .persistence
        .user_find_by_id(path.into_inner())
        .await?
        .ok_or_else(|| EliteError::NotFound("User".to_string()))?;
    Ok(response::Result::<KycStatusView>::http_success(
        KycStatusView::of(&user).with_identity(&user),
    ))
}

#[post("/request-additional-docs")]
pub async fn request_additional_docs(
    admin: AdminUser,
    data: web::Data<AppState>,
    body: web::Json<AdditionalDocsRequest>,
) -> Result<HttpResponse, AppError> {
    let deadline_days = body.deadline_days.unwrap_or(DEFAULT_DEADLINE_DAYS);
    let (user, deadline) = data
        .kyc
        .request_additional_documents(
            body.user_id,
            &body.required_documents,
            &body.reason,
            deadline_days,
        )
        .await?;

    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_KYC_DOCS_REQUESTED,
            json!({
                "user_id": user.id,
                "required_documents": body.required_documents,
                "reason": body.reason,
                "deadline": deadline.to_string(),
            }),
        )
        .await;

    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": format!(
            "Additional documents requested from user. Deadline: {}",
            deadline.format("%Y-%m-%d")
        ),
        "deadline": deadline.to_string(),
    })))
}
