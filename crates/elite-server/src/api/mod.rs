// API module organization
// Route scopes grouped by resource, mounted by `startup::configure_routes`

// Shared request models and multipart reading
pub mod model;
pub mod multipart;

// Liveness, metrics and file serving
pub mod files;
pub mod health;
pub mod metrics;
pub mod uploads;

// Customer API
pub mod accounts;
pub mod auth;
pub mod kyc;
pub mod otp;
pub mod pin;
pub mod profile;
pub mod transactions;
pub mod withdrawal_accounts;

// Back office API
pub mod admin;
