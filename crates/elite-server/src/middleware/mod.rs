// HTTP middleware implementations
// Authentication, rate limiting, and request tracing

pub mod auth;
pub mod rate_limit;
pub mod tracing;
