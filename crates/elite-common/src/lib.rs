//! Elite Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used across all Elite components:
//! - Error types and error codes
//! - Input validation helpers
//! - Utility functions

pub mod error;
pub mod utils;
pub mod validation;

pub use error::{EliteError, ErrorCode};

/// Service name reported by health endpoints
pub const SERVICE_NAME: &str = "elitesolution-financial-api";

/// Human readable product name
pub const PROJECT_NAME: &str = "EliteSolution Financial API";

/// API version reported by health endpoints
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Versioned API prefix
pub const API_V1_PREFIX: &str = "/api/v1";

/// Currency assigned to accounts when none is requested
pub const DEFAULT_CURRENCY: &str = "NGN";
