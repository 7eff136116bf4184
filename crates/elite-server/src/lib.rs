//! Elite Server - EliteSolution financial API
//!
//! - `api` - HTTP handlers grouped by resource
//! - `middleware` - authentication, rate limiting, request tracing
//! - `model` - configuration, application state, response envelope
//! - `secured` - extractors for the signed-in user and admin
//! - `service` - ledger, KYC, uploads, withdrawal accounts, back office
//! - `startup` - logging, HTTP server, graceful shutdown, health check

pub mod api;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod secured;
pub mod service;
pub mod startup;
