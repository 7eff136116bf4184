// Customer authentication endpoints
//
// Sign-in is two steps: the password step sends a LOGIN code, the code step
// returns the access token. Registration works the same way with a
// REGISTRATION code and opens the first account once the email is confirmed.

use actix_web::{HttpRequest, HttpResponse, Scope, get, post, web};
use elite_auth::{
    AccessToken, INVALID_CREDENTIALS_MESSAGE, INVALID_OTP_MESSAGE,
    service::password::{hash_secret, verify_secret},
};
use elite_common::{
    API_V1_PREFIX, EliteError,
    utils::{normalize_email, utc_now},
    validation::{validate_password_strength, validate_phone},
};
use elite_persistence::{NewUser, OtpPurpose, UserInfo, UserPatch};
use serde::Deserialize;
use validator::Validate;

use crate::{
    api::{
        kyc,
        model::{EmailCode, EmailOnly},
    },
    error::AppError,
    middleware::rate_limit::AuthRateLimiter,
    model::{AppState, MessageBody, response},
    secured::{CurrentUser, INACTIVE_USER_MESSAGE, client_ip},
    service::users::UserView,
};

pub const VERIFY_EMAIL_FIRST_MESSAGE: &str = "Please verify your email first";
const PASSWORD_RESET_SENT_MESSAGE: &str =
    "If an account exists for this email, a password reset code has been sent.";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "last name is required"))]
    pub last_name: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Rejects an unknown email with 404, the way the confirmation endpoints do
pub async fn find_user_by_email(data: &AppState, email: &str) -> Result<UserInfo, AppError> {
    data.persistence
        .user_find_by_email(&normalize_email(email))
        .await?
        .ok_or_else(|| EliteError::NotFound("User".to_string()).into())
}

/// Counts a credential attempt, refusing it while the key is locked out
pub fn guard_attempt(data: &AppState, key: &str) -> Result<(), AppError> {
    let outcome = data.auth_rate_limiter.record_attempt(key);
    if !outcome.allowed {
        return Err(EliteError::TooManyRequests(format!(
            "Too many attempts. Please try again in {} seconds.",
            outcome.lockout_secs
        ))
        .into());
    }
    Ok(())
}

/// Stores a new password hash and stamps the change time
pub async fn store_password(data: &AppState, user_id: i64, password: &str) -> Result<UserInfo, AppError> {
    let patch = UserPatch {
        password_hash: Some(hash_secret(password)?),
        last_password_change: Some(Some(utc_now())),
        ..Default::default()
    };
    Ok(data.persistence.user_update(user_id, &patch).await?)
}

#[post("/register")]
async fn register(
    data: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let email = normalize_email(&body.email);
    if data.persistence.user_find_by_email(&email).await?.is_some() {
        return Err(EliteError::Conflict("User already exists".to_string()).into());
    }

    let user = data
        .persistence
        .user_create(NewUser {
            email,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            phone: body.phone.as_deref().map(str::trim).map(String::from),
            password_hash: hash_secret(&body.password)?,
            is_admin: false,
        })
        .await?;

    data.otp_service.issue(&user, OtpPurpose::Registration).await?;
    tracing::info!(user_id = user.id, "User registered");

    Ok(response::Result::<MessageBody>::http_created(MessageBody::new(
        "Registration successful. Please verify your email with OTP.",
    )))
}

#[post("/verify-registration")]
async fn verify_registration(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<EmailCode>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("verify-registration", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let user = find_user_by_email(&data, &email).await?;
    if user.is_verified {
        return Err(EliteError::IllegalArgument("User already verified".to_string()).into());
    }

    data.otp_service
        .verify(user.id, OtpPurpose::Registration, &body.code)
        .await?;
    data.auth_rate_limiter.record_success(&key);

    let patch = UserPatch {
        is_verified: Some(true),
        ..Default::default()
    };
    let user = data.persistence.user_update(user.id, &patch).await?;
    let account = data.accounts.ensure_default(user.id).await?;
    tracing::info!(user_id = user.id, account_number = %account.account_number, "Email verified");

    let token = data.issue_token(user.id, &user.email, user.is_admin)?;
    Ok(response::Result::<serde_json::Value>::http_success(serde_json::json!({
        "access_token": token,
        "token_type": elite_auth::TOKEN_TYPE,
        "message": "Email verified successfully",
        "account_number": account.account_number,
    })))
}

#[post("/login")]
async fn login(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("login", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let user = match data.persistence.user_find_by_email(&email).await? {
        Some(user) if verify_secret(&body.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(email = %email, "Failed login attempt");
            return Err(EliteError::Unauthorized(INVALID_CREDENTIALS_MESSAGE.to_string()).into());
        }
    };
    data.auth_rate_limiter.record_success(&key);

    if !user.is_active {
        return Err(EliteError::Forbidden(INACTIVE_USER_MESSAGE.to_string()).into());
    }
    if !user.is_verified {
        return Err(EliteError::IllegalArgument(VERIFY_EMAIL_FIRST_MESSAGE.to_string()).into());
    }

    data.otp_service.issue(&user, OtpPurpose::Login).await?;
    Ok(MessageBody::http(
        "OTP sent to your email. Please verify to complete login.",
    ))
}

#[post("/verify-login")]
async fn verify_login(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<EmailCode>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("verify-login", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let user = find_user_by_email(&data, &email).await?;
    if !user.is_active {
        return Err(EliteError::Forbidden(INACTIVE_USER_MESSAGE.to_string()).into());
    }

    data.otp_service
        .verify(user.id, OtpPurpose::Login, &body.code)
        .await?;
    data.auth_rate_limiter.record_success(&key);

    let token = data.issue_token(user.id, &user.email, user.is_admin)?;
    tracing::info!(user_id = user.id, "User logged in");
    Ok(response::Result::<AccessToken>::http_success(
        AccessToken::bearer(token).with_user(user.id, &user.email),
    ))
}

#[get("/me")]
async fn me(user: CurrentUser) -> HttpResponse {
    response::Result::<UserView>::http_success(UserView::from(&user.0))
}

#[post("/forgot-password")]
async fn forgot_password(
    data: web::Data<AppState>,
    body: web::Json<EmailOnly>,
) -> Result<HttpResponse, AppError> {
    let email = normalize_email(&body.email);
    if let Some(user) = data.persistence.user_find_by_email(&email).await?
        && user.is_active
        && let Err(e) = data.otp_service.issue(&user, OtpPurpose::PasswordReset).await
    {
        tracing::warn!(user_id = user.id, error = %e, "Password reset code not issued");
    }
    Ok(MessageBody::http(PASSWORD_RESET_SENT_MESSAGE))
}

#[post("/reset-password")]
async fn reset_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let email = normalize_email(&body.email);
    let key = AuthRateLimiter::key("reset-password", &email, &client_ip(&req));
    guard_attempt(&data, &key)?;

    let invalid = || EliteError::IllegalArgument(INVALID_OTP_MESSAGE.to_string());
    let user = data
        .persistence
        .user_find_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    data.otp_service
        .verify(user.id, OtpPurpose::PasswordReset, &body.code)
        .await?;
    data.auth_rate_limiter.record_success(&key);
    let user = store_password(&data, user.id, &body.new_password).await?;

    tracing::info!(user_id = user.id, "Password reset");
    Ok(MessageBody::http("Password reset successfully"))
}

#[post("/change-password")]
async fn change_password(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AppError> {
    if !verify_secret(&body.current_password, &user.password_hash) {
        return Err(EliteError::IllegalArgument("Current password is incorrect".to_string()).into());
    }
    if body.new_password != body.confirm_password {
        return Err(EliteError::IllegalArgument("New passwords do not match".to_string()).into());
    }
    validate_password_strength(&body.new_password)
        .map_err(|e| EliteError::IllegalArgument(elite_common::validation::message_of(&e)))?;
    if body.new_password == body.current_password {
        return Err(EliteError::IllegalArgument(
            "New password must be different from current password".to_string(),
        )
        .into());
    }

    let user = store_password(&data, user.id, &body.new_password).await?;
    tracing::info!(user_id = user.id, "Password changed");
    Ok(MessageBody::http("Password changed successfully"))
}

pub fn routes() -> Scope {
    web::scope(&format!("{}/auth", API_V1_PREFIX))
        .service(register)
        .service(verify_registration)
        .service(login)
        .service(verify_login)
        .service(me)
        .service(forgot_password)
        .service(reset_password)
        .service(change_password)
        .configure(kyc::configure)
}
