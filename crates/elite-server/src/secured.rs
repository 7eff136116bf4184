// Request extractors that resolve the authenticated user
//
// The Authentication middleware only decodes the token. These extractors load
// the user behind it so that suspended or deleted accounts are refused even
// while their token is still valid.

use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web};
use elite_auth::AuthContext;
use elite_common::EliteError;
use elite_persistence::UserInfo;
use futures::future::LocalBoxFuture;

use crate::{error::AppError, model::AppState};

pub const NOT_AUTHENTICATED_MESSAGE: &str = "Not authenticated";
pub const INACTIVE_USER_MESSAGE: &str = "Account is suspended";
pub const ADMIN_REQUIRED_MESSAGE: &str = "Admin privileges required";

/// Authenticated, active user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserInfo);

/// Authenticated, active user with the admin flag
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserInfo);

impl std::ops::Deref for CurrentUser {
    type Target = UserInfo;

    fn deref(&self) -> &UserInfo {
        &self.0
    }
}

impl std::ops::Deref for AdminUser {
    type Target = UserInfo;

    fn deref(&self) -> &UserInfo {
        &self.0
    }
}

pub fn auth_context(req: &HttpRequest) -> AuthContext {
    req.extensions()
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_default()
}

/// Resolve the user of a request's token, refusing missing, invalid, or
/// expired tokens and users that no longer exist or are suspended.
pub async fn resolve_user(
    context: &AuthContext,
    data: &web::Data<AppState>,
) -> Result<UserInfo, AppError> {
    if context.jwt_error.is_some() {
        return Err(EliteError::Unauthorized(context.jwt_error_string()).into());
    }
    let Some(user_id) = context.user_id else {
        return Err(EliteError::Unauthorized(NOT_AUTHENTICATED_MESSAGE.to_string()).into());
    };

    let user = data
        .persistence
        .user_find_by_id(user_id)
        .await?
        .ok_or_else(|| EliteError::Unauthorized(NOT_AUTHENTICATED_MESSAGE.to_string()))?;

    if !user.is_active {
        return Err(EliteError::Forbidden(INACTIVE_USER_MESSAGE.to_string()).into());
    }
    Ok(user)
}

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| EliteError::InternalError("application state missing".to_string()).into())
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let context = auth_context(req);
        let data = app_state(req);
        Box::pin(async move { Ok(CurrentUser(resolve_user(&context, &data?).await?)) })
    }
}

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let context = auth_context(req);
        let data = app_state(req);
        Box::pin(async move {
            let user = resolve_user(&context, &data?).await?;
            if !user.is_admin {
                tracing::warn!(user_id = user.id, "Non-admin attempted admin access");
                return Err(EliteError::Forbidden(ADMIN_REQUIRED_MESSAGE.to_string()).into());
            }
            Ok(AdminUser(user))
        })
    }
}

/// Client address used in rate limiter keys and audit details
pub fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}
