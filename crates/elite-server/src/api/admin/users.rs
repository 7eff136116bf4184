// User management

use actix_web::{HttpResponse, delete, get, post, put, web};
use elite_common::{EliteError, utils::normalize_page};
use elite_persistence::{KycStatus, Page, UserQuery};
use serde::Deserialize;
use serde_json::json;

use crate::{
    api::model::parse_filter,
    error::AppError,
    model::{AppState, MessageBody, response},
    secured::AdminUser,
    service::users::{BulkAction, BulkOutcome, ExportFormat, ExportType, UserExport, UserView},
};

/// Upper bound on ids accepted by one bulk request
const MAX_BULK_USERS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub kyc_status: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkActionRequest {
    pub user_ids: Vec<i64>,
    pub action: BulkAction,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub export_type: String,
    pub format: Option<String>,
}

#[get("/users")]
pub async fn list_users(
    _admin: AdminUser,
    data: web::Data<AppState>,
    params: web::Query<UserListParams>,
) -> Result<HttpResponse, AppError> {
    let kyc_status: Option<KycStatus> = parse_filter("kyc_status", params.kyc_status.as_deref())?;
    let query = UserQuery {
        kyc_status,
        is_active: params.is_active,
        is_admin: None,
        search: params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from),
    };
    let (page_no, page_size) = normalize_page(params.page, params.page_size);

    let page = data.users.list(&query, page_no, page_size).await?;
    Ok(response::Result::<Page<UserView>>::http_success(page))
}

#[put("/users/{id}/suspend")]
pub async fn suspend_user(
    admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    body: Option<web::Json<SuspendRequest>>,
) -> Result<HttpResponse, AppError> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let user = data
        .users
        .suspend(&admin, path.into_inner(), body.reason.as_deref())
        .await?;
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": format!("User {} suspended", user.email),
        "reason": body.reason,
    })))
}

#[put("/users/{id}/activate")]
pub async fn activate_user(
    admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let user = data.users.activate(&admin, path.into_inner()).await?;
    Ok(MessageBody::http(format!("User {} activated", user.email)))
}

#[put("/users/{id}/reset-password")]
pub async fn reset_password(
    admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    let user = data
        .users
        .reset_password(&admin, path.into_inner(), &body.new_password)
        .await?;
    Ok(MessageBody::http(format!("Password reset for user {}", user.email)))
}

#[put("/users/{id}/update")]
pub async fn update_user(
    admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let user = data
        .users
        .update_details(
            &admin,
            path.into_inner(),
            body.email.as_deref(),
            body.phone.as_deref(),
        )
        .await?;
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": format!("User {} updated", user.id),
        "user": { "email": user.email, "phone": user.phone },
    })))
}

#[delete("/user/{id}")]
pub async fn delete_user(
    admin: AdminUser,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let email = data.users.delete(&admin, path.into_inner()).await?;
    Ok(MessageBody::http(format!("User {} deleted", email)))
}

#[post("/users/bulk-actions")]
pub async fn bulk_actions(
    admin: AdminUser,
    data: web::Data<AppState>,
    body: web::Json<BulkActionRequest>,
) -> Result<HttpResponse, AppError> {
    if body.user_ids.is_empty() {
        return Err(EliteError::IllegalArgument("user_ids must not be empty".to_string()).into());
    }
    if body.user_ids.len() > MAX_BULK_USERS {
        return Err(EliteError::IllegalArgument(format!(
            "At most {} users can be processed at once",
            MAX_BULK_USERS
        ))
        .into());
    }

    let outcome = data
        .users
        .bulk(&admin, &body.user_ids, body.action, body.reason.as_deref())
        .await?;
    Ok(response::Result::<BulkOutcome>::http_success(outcome))
}

#[get("/users/export")]
pub async fn export_users(
    admin: AdminUser,
    data: web::Data<AppState>,
    params: web::Query<ExportParams>,
) -> Result<HttpResponse, AppError> {
    let export_type: ExportType = params.export_type.trim().parse()?;
    let format: ExportFormat = match params.format.as_deref().map(str::trim) {
        None | Some("") => ExportFormat::default(),
        Some(format) => format.parse()?,
    };

    let export = data.users.export(&admin, export_type, format).await?;
    Ok(response::Result::<UserExport>::http_success(export))
}
