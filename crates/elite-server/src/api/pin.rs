// PIN sign-in and management endpoints

use actix_web::{HttpRequest, HttpResponse, Scope, delete, get, post, web};
use elite_auth::{AccessToken, service::pin::PinStatus};
use elite_common::{API_V1_PREFIX, EliteError, utils::normalize_email, validation};
use elite_persistence::OtpPurpose;
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        auth::{find_user_by_email, guard_attempt},
        model::EmailOnly,
    },
    error::AppError,
    middleware::rate_limit::AuthRateLimiter,
    model::{AppState, MessageBody, response},
    secured::{CurrentUser, INACTIVE_USER_MESSAGE, client_ip},
};

const PIN_RESET_SENT_MESSAGE: &str = "If the email exists, PIN reset instructions have been sent.";

#[derive(Debug, Deserialize)]
pub struct PinSetupRequest {
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct PinLoginRequest {
    pub email: String,
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPinRequest {
    pub email: String,
    pub code: String,
    pub new_pin: String,
}

#[derive(Debug, Serialize)]
struct PinLoginResponse {
    #[serde(flatten)]
    token: AccessToken,
    message: &'static str,
}

#[post("/setup")]
async fn setup(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<PinSetupRequest>,
) -> Result<HttpResponse, AppError> {
    data.pin_service.setup(user.id, &body.pin).await?;
    Ok(response::Result::<MessageBody>::http_created(MessageBody::new(
        "PIN setup successfully",
    )))
}

#[post("/verify")]
async fn verify(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<PinLoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("pin", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let user = find_user_by_email(&data, &email).await?;
    if !user.is_active {
        return Err(EliteError::Forbidden(INACTIVE_USER_MESSAGE.to_string()).into());
    }

    data.pin_service.verify(&user, &body.pin).await?;
    data.auth_rate_limiter.record_success(&key);

    let token = data.issue_token(user.id, &user.email, user.is_admin)?;
    Ok(response::Result::<PinLoginResponse>::http_success(PinLoginResponse {
        token: AccessToken::bearer(token).with_user(user.id, &user.email),
        message: "PIN verification successful",
    }))
}

#[get("/status")]
async fn status(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let status = data.pin_service.status(user.id).await?;
    Ok(response::Result::<PinStatus>::http_success(status))
}

#[post("/enable")]
async fn enable(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    data.pin_service.set_active(user.id, true).await?;
    Ok(MessageBody::http("PIN enabled successfully"))
}

#[post("/disable")]
async fn disable(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    data.pin_service.set_active(user.id, false).await?;
    Ok(MessageBody::http("PIN disabled successfully"))
}

#[delete("/reset")]
async fn reset(user: CurrentUser, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    data.pin_service.remove(user.id).await?;
    Ok(MessageBody::http("PIN reset successfully. Please setup a new PIN."))
}

#[post("/forgot-pin")]
async fn forgot_pin(
    data: web::Data<AppState>,
    body: web::Json<EmailOnly>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    if let Some(user) = data.persistence.user_find_by_email(&email).await?
        && user.is_active
        && data.pin_service.has_active_pin(user.id).await?
        && let Err(e) = data.otp_service.issue(&user, OtpPurpose::PinReset).await
    {
        tracing::warn!(user_id = user.id, error = %e, "PIN reset code not issued");
    }
    Ok(MessageBody::http(PIN_RESET_SENT_MESSAGE))
}

#[post("/reset-pin")]
async fn reset_pin(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<ResetPinRequest>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("reset-pin", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let user = find_user_by_email(&data, &email).await?;
    validation::validate_pin(&body.new_pin)
        .map_err(|e| EliteError::IllegalArgument(validation::message_of(&e)))?;

    data.otp_service
        .verify(user.id, OtpPurpose::PinReset, &body.code)
        .await?;
    data.auth_rate_limiter.record_success(&key);
    data.pin_service.setup(user.id, &body.new_pin).await?;

    tracing::info!(user_id = user.id, "PIN reset with OTP");
    Ok(MessageBody::http(
        "PIN reset successfully. You can now login with your new PIN.",
    ))
}

pub fn routes() -> Scope {
    web::scope(&format!("{}/pin", API_V1_PREFIX))
        .service(setup)
        .service(verify)
        .service(status)
        .service(enable)
        .service(disable)
        .service(reset)
        .service(forgot_pin)
        .service(reset_pin)
}
