//! Application startup utilities module.
//!
//! Logging, the HTTP server, graceful shutdown and the container health check.

mod http;
mod logging;
mod healthcheck;
mod shutdown;

pub use http::{configure_routes, main_server};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use healthcheck::{HEALTH_PATH, check_health, default_health_url};
pub use shutdown::{GracefulShutdown, ShutdownSignal, wait_for_shutdown_signal};
