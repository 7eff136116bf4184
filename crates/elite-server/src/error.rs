// Error handling for the Elite HTTP layer
// Maps domain errors from elite_common onto HTTP responses

use std::fmt::{Display, Formatter};

use actix_web::HttpResponse;

pub use elite_common::error::{
    ACCESS_DENIED, DATA_ACCESS_ERROR, INSUFFICIENT_FUNDS, PARAMETER_MISSING,
    PARAMETER_VALIDATE_ERROR, RESOURCE_CONFLICT, RESOURCE_LOCKED, RESOURCE_NOT_FOUND,
    SERVER_ERROR, SUCCESS, TOKEN_EXPIRED, TOO_MANY_REQUESTS, UNAUTHORIZED,
};
pub use elite_common::{EliteError, ErrorCode};

use crate::model::response as common;

// Local wrapper for application errors to implement actix-web error handling
// (Cannot impl foreign trait for foreign type due to orphan rules)
#[derive(Debug)]
pub struct AppError {
    inner: anyhow::Error,
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError { inner: value }
    }
}

impl From<EliteError> for AppError {
    fn from(value: EliteError) -> Self {
        AppError {
            inner: value.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(value: validator::ValidationErrors) -> Self {
        EliteError::from(value).into()
    }
}

impl AppError {
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

/// HTTP status for a domain error
pub fn status_of(error: &EliteError) -> u16 {
    match error {
        EliteError::IllegalArgument(_)
        | EliteError::ValidationFailed(_)
        | EliteError::InsufficientFunds { .. } => 400,
        EliteError::Unauthorized(_) => 401,
        EliteError::Forbidden(_) => 403,
        EliteError::NotFound(_) => 404,
        EliteError::Conflict(_) => 409,
        EliteError::Locked(_) => 423,
        EliteError::TooManyRequests(_) => 429,
        EliteError::DatabaseError(_) | EliteError::ConfigError(_) | EliteError::InternalError(_) => {
            500
        }
    }
}

impl actix_web::error::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let Some(e) = self.downcast_ref::<EliteError>() else {
            tracing::error!(error = %self.inner, "Unhandled error");
            return common::Result::<()>::http_response(
                500,
                SERVER_ERROR.code,
                self.inner.to_string(),
                (),
            );
        };

        let status = status_of(e);
        if status >= 500 {
            tracing::error!(error = %e, "Request failed");
        }

        match e {
            EliteError::ValidationFailed(errors) => common::Result::<Vec<String>>::http_response(
                status,
                e.error_code().code,
                "Validation failed".to_string(),
                errors.clone(),
            ),
            EliteError::InsufficientFunds { .. } => common::Result::<()>::http_response(
                status,
                e.error_code().code,
                "Insufficient funds".to_string(),
                (),
            ),
            _ => common::Result::<()>::http_response(
                status,
                e.error_code().code,
                e.to_string(),
                (),
            ),
        }
    }
}
