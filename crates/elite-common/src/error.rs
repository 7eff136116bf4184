//! Error types and error codes for the Elite API
//!
//! This module defines:
//! - `EliteError`: Application-specific error enum
//! - `ErrorCode`: Structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum EliteError {
    #[error("{0}")]
    IllegalArgument(String),

    #[error("{}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("{0}")]
    Locked(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl EliteError {
    /// Error code reported in the response envelope
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            EliteError::IllegalArgument(_) => PARAMETER_VALIDATE_ERROR,
            EliteError::ValidationFailed(_) => PARAMETER_VALIDATE_ERROR,
            EliteError::Unauthorized(_) => UNAUTHORIZED,
            EliteError::Forbidden(_) => ACCESS_DENIED,
            EliteError::NotFound(_) => RESOURCE_NOT_FOUND,
            EliteError::Conflict(_) => RESOURCE_CONFLICT,
            EliteError::InsufficientFunds { .. } => INSUFFICIENT_FUNDS,
            EliteError::Locked(_) => RESOURCE_LOCKED,
            EliteError::TooManyRequests(_) => TOO_MANY_REQUESTS,
            EliteError::DatabaseError(_) => DATA_ACCESS_ERROR,
            EliteError::ConfigError(_) | EliteError::InternalError(_) => SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for EliteError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EliteError::ValidationFailed(crate::validation::collect_messages(&errors))
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const ACCESS_DENIED: ErrorCode<'static> = ErrorCode {
    code: 10001,
    message: "access denied",
};

pub const DATA_ACCESS_ERROR: ErrorCode<'static> = ErrorCode {
    code: 10002,
    message: "data access error",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const MEDIA_TYPE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20003,
    message: "media type error",
};

pub const RESOURCE_NOT_FOUND: ErrorCode<'static> = ErrorCode {
    code: 20004,
    message: "resource not found",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource conflict",
};

// Authentication errors
pub const UNAUTHORIZED: ErrorCode<'static> = ErrorCode {
    code: 30001,
    message: "unauthorized",
};

pub const RESOURCE_LOCKED: ErrorCode<'static> = ErrorCode {
    code: 30002,
    message: "resource locked",
};

pub const TOO_MANY_REQUESTS: ErrorCode<'static> = ErrorCode {
    code: 30003,
    message: "too many requests",
};

pub const TOKEN_EXPIRED: ErrorCode<'static> = ErrorCode {
    code: 30004,
    message: "token expired",
};

// Ledger errors
pub const INSUFFICIENT_FUNDS: ErrorCode<'static> = ErrorCode {
    code: 40001,
    message: "insufficient funds",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 50000,
    message: "server error",
};
