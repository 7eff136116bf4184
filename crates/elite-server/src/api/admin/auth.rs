// Admin sign-up and sign-in
//
// Self-registration is a bootstrap step: it is open while no verified admin
// exists and afterwards only when `elite.admin.registration_enabled` is set.

use actix_web::{HttpRequest, HttpResponse, post, web};
use elite_auth::{
    AccessToken, INVALID_CREDENTIALS_MESSAGE,
    service::{password::hash_secret, password::verify_secret, token::invalidate_token},
};
use elite_common::{
    EliteError,
    utils::normalize_email,
    validation::{validate_password_strength, validate_phone},
};
use elite_persistence::{NewUser, OtpPurpose, UserInfo, UserPatch, UserQuery};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    api::{
        auth::{LoginRequest, guard_attempt},
        model::EmailCode,
    },
    error::AppError,
    middleware::{auth::extract_token, rate_limit::AuthRateLimiter},
    model::{AppState, MessageBody, response},
    secured::{AdminUser, INACTIVE_USER_MESSAGE, client_ip},
    service::audit,
};

const NOT_ADMIN_MESSAGE: &str = "Not authorized as admin";

#[derive(Debug, Deserialize, Validate)]
pub struct AdminRegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
}

fn name_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

async fn find_admin(data: &AppState, email: &str) -> Result<UserInfo, AppError> {
    data.persistence
        .user_find_by_email(&normalize_email(email))
        .await?
        .filter(|u| u.is_admin)
        .ok_or_else(|| EliteError::Forbidden(NOT_ADMIN_MESSAGE.to_string()).into())
}

async fn registration_open(data: &AppState) -> anyhow::Result<bool> {
    if data.configuration.admin_registration_enabled() {
        return Ok(true);
    }
    let admins = data
        .persistence
        .user_count(&UserQuery {
            is_admin: Some(true),
            is_verified: Some(true),
            ..Default::default()
        })
        .await?;
    Ok(admins == 0)
}

#[post("/register")]
pub async fn register(
    data: web::Data<AppState>,
    body: web::Json<AdminRegisterRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    if !registration_open(&data).await? {
        return Err(EliteError::Forbidden("Admin registration is disabled".to_string()).into());
    }

    let email = normalize_email(&body.email);
    if data.persistence.user_find_by_email(&email).await?.is_some() {
        return Err(EliteError::Conflict("Admin already exists".to_string()).into());
    }

    let admin = data
        .persistence
        .user_create(NewUser {
            email,
            first_name: name_or(&body.first_name, "Admin"),
            last_name: name_or(&body.last_name, "Account"),
            phone: body.phone.as_deref().map(str::trim).map(String::from),
            password_hash: hash_secret(&body.password)?,
            is_admin: true,
        })
        .await?;

    data.otp_service
        .issue(&admin, OtpPurpose::AdminRegistration)
        .await?;
    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_ADMIN_REGISTERED,
            json!({ "email": admin.email }),
        )
        .await;

    Ok(response::Result::<MessageBody>::http_created(MessageBody::new(
        "Admin registered. Please verify with OTP.",
    )))
}

#[post("/verify-registration")]
pub async fn verify_registration(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<EmailCode>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("admin-verify-registration", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let admin = find_admin(&data, &email).await?;
    data.otp_service
        .verify(admin.id, OtpPurpose::AdminRegistration, &body.code)
        .await?;
    data.auth_rate_limiter.record_success(&key);

    let patch = UserPatch {
        is_verified: Some(true),
        ..Default::default()
    };
    let admin = data.persistence.user_update(admin.id, &patch).await?;
    tracing::info!(admin_id = admin.id, "Admin registration verified");

    Ok(MessageBody::http("Admin registration verified successfully"))
}

#[post("/login")]
pub async fn login(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("admin-login", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let user = match data.persistence.user_find_by_email(&email).await? {
        Some(user) if verify_secret(&body.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(email = %email, "Failed admin login attempt");
            return Err(EliteError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string()).into());
        }
    };
    data.auth_rate_limiter.record_success(&key);

    if !user.is_admin {
        tracing::warn!(user_id = user.id, "Non-admin attempted admin login");
        return Err(EliteError::Forbidden("This account is not an admin".to_string()).into());
    }
    if !user.is_active {
        return Err(EliteError::Forbidden(INACTIVE_USER_MESSAGE.to_string()).into());
    }

    data.otp_service.issue(&user, OtpPurpose::AdminLogin).await?;
    Ok(MessageBody::http(
        "Admin OTP sent to email. Verify to complete login.",
    ))
}

#[post("/verify-login")]
pub async fn verify_login(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<EmailCode>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("admin-verify-login", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let admin = find_admin(&data, &email).await?;
    if !admin.is_active {
        return Err(EliteError::Forbidden(INACTIVE_USER_MESSAGE.to_string()).into());
    }
    data.otp_service
        .verify(admin.id, OtpPurpose::AdminLogin, &body.code)
        .await?;
    data.auth_rate_limiter.record_success(&key);

    let token = data.issue_token(admin.id, &admin.email, true)?;
    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_ADMIN_LOGIN,
            json!({ "email": admin.email, "ip": client_ip(&req) }),
        )
        .await;

    Ok(response::Result::<AccessToken>::http_success(
        AccessToken::bearer(token).with_user(admin.id, &admin.email),
    ))
}

/// Tokens are stateless; logout drops the cached decode and records the event
#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    admin: AdminUser,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if let Some(token) = extract_token(&req) {
        invalidate_token(&token);
    }
    data.audit
        .record(
            Some(admin.id),
            audit::ACTION_ADMIN_LOGOUT,
            json!({ "email": admin.email }),
        )
        .await;
    Ok(MessageBody::http("Admin logged out successfully"))
}
