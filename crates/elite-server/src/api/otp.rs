// One-time password endpoints

use actix_web::{HttpRequest, HttpResponse, Scope, post, web};
use elite_common::{API_V1_PREFIX, utils::normalize_email};
use elite_persistence::OtpPurpose;
use serde::Deserialize;
use serde_json::json;

use crate::{
    api::auth::{find_user_by_email, guard_attempt},
    error::AppError,
    middleware::rate_limit::AuthRateLimiter,
    model::{AppState, response},
    secured::{CurrentUser, client_ip},
};

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub purpose: OtpPurpose,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub purpose: OtpPurpose,
    pub code: String,
}

#[post("/resend")]
async fn resend(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<ResendRequest>,
) -> Result<HttpResponse, AppError> {
    data.otp_service.issue(&user, body.purpose).await?;
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "success": true,
        "message": format!("OTP sent to {} for {}", user.email, body.purpose),
    })))
}

#[post("/verify")]
async fn verify(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("otp-verify", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let user = find_user_by_email(&data, &email).await?;
    data.otp_service
        .verify(user.id, body.purpose, &body.code)
        .await?;
    data.auth_rate_limiter.record_success(&key);
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "success": true,
        "message": "OTP verified successfully",
    })))
}

pub fn routes() -> Scope {
    web::scope(&format!("{}/otp", API_V1_PREFIX))
        .service(resend)
        .service(verify)
}
