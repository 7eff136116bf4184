//! Authentication models
//!
//! This file defines the JWT payload, the per-request auth context and the
//! configuration keys of the auth subsystem.

use jsonwebtoken::errors::ErrorKind;
use serde::{Deserialize, Serialize};

// Auth configuration keys
pub const TOKEN_SECRET_KEY: &str = "elite.auth.secret_key";
pub const TOKEN_EXPIRE_MINUTES: &str = "elite.auth.token_expire_minutes";
pub const DEFAULT_TOKEN_EXPIRE_MINUTES: i64 = 30;

// OTP configuration keys
pub const OTP_EXPIRY_MINUTES: &str = "elite.otp.expiry_minutes";
pub const DEFAULT_OTP_EXPIRY_MINUTES: i64 = 10;
pub const OTP_MAX_DAILY: &str = "elite.otp.max_daily";
pub const DEFAULT_OTP_MAX_DAILY: u64 = 10;
pub const OTP_MAX_FAILED_ATTEMPTS: &str = "elite.otp.max_failed_attempts";
pub const DEFAULT_OTP_MAX_FAILED_ATTEMPTS: i32 = 5;
pub const OTP_LOG_CODES: &str = "elite.otp.log_codes";
pub const OTP_CODE_LENGTH: usize = 6;

// PIN configuration keys
pub const PIN_MAX_ATTEMPTS: &str = "elite.pin.max_attempts";
pub const DEFAULT_PIN_MAX_ATTEMPTS: i32 = 3;
pub const PIN_LOCK_MINUTES: &str = "elite.pin.lock_minutes";
pub const DEFAULT_PIN_LOCK_MINUTES: i64 = 10;

pub const BCRYPT_COST: u32 = 10;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const ACCESS_TOKEN: &str = "accessToken";
pub const TOKEN_PREFIX: &str = "Bearer ";
pub const TOKEN_TYPE: &str = "bearer";

pub const INVALID_OTP_MESSAGE: &str = "Invalid or expired OTP";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtPayload {
    /// User email
    pub sub: String,
    /// User id
    pub uid: i64,
    /// Admin flag at issue time
    #[serde(default)]
    pub adm: bool,
    pub exp: i64,
}

/// Token returned by login style endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AccessToken {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            user_id: None,
            email: None,
        }
    }

    pub fn with_user(mut self, user_id: i64, email: &str) -> Self {
        self.user_id = Some(user_id);
        self.email = Some(email.to_string());
        self
    }
}

/// Auth context passed through request extensions
#[derive(Debug, Default, Clone)]
pub struct AuthContext {
    pub user_id: Option<i64>,
    pub email: String,
    pub is_admin: bool,
    pub jwt_error: Option<jsonwebtoken::errors::Error>,
    pub token_provided: bool,
}

impl AuthContext {
    pub fn from_claims(claims: &JwtPayload) -> Self {
        Self {
            user_id: Some(claims.uid),
            email: claims.sub.clone(),
            is_admin: claims.adm,
            jwt_error: None,
            token_provided: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some() && self.jwt_error.is_none()
    }

    pub fn jwt_error_string(&self) -> String {
        if let Some(e) = &self.jwt_error {
            match e.kind() {
                ErrorKind::ExpiredSignature => "token expired!".to_string(),
                _ => e.to_string(),
            }
        } else {
            String::default()
        }
    }
}
