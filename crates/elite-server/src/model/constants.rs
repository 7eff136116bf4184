//! Configuration keys and server defaults

// Server
pub const SERVER_ADDRESS_PROPERTY: &str = "server.address";
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";
pub const SERVER_PORT_PROPERTY: &str = "server.port";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const SERVER_WORKERS_PROPERTY: &str = "server.workers";
pub const SHUTDOWN_TIMEOUT_PROPERTY: &str = "server.shutdown_timeout_secs";
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// Persistence
pub const PERSISTENCE_MODE_PROPERTY: &str = "elite.persistence.mode";
pub const EMBEDDED_DATA_DIR_PROPERTY: &str = "elite.persistence.embedded.data_dir";
pub const DEFAULT_EMBEDDED_DATA_DIR: &str = "data";
pub const DB_URL_PROPERTY: &str = "db.url";

// Ledger
pub const TRANSACTION_LIMIT_PROPERTY: &str = "elite.ledger.transaction_limit_cents";
pub const DEFAULT_TRANSACTION_LIMIT_CENTS: i64 = 1_000_000;
pub const LARGE_TRANSACTION_PROPERTY: &str = "elite.ledger.large_transaction_cents";
pub const DEFAULT_LARGE_TRANSACTION_CENTS: i64 = 500_000;

// Uploads
pub const UPLOAD_ROOT_PROPERTY: &str = "elite.upload.root";
pub const DEFAULT_UPLOAD_ROOT: &str = "static";
pub const UPLOAD_MAX_FILE_SIZE_PROPERTY: &str = "elite.upload.max_file_size";
pub const DEFAULT_UPLOAD_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

// Admin
pub const ADMIN_REGISTRATION_ENABLED_PROPERTY: &str = "elite.admin.registration_enabled";

// Request rate limiting
pub const RATE_LIMIT_ENABLED_PROPERTY: &str = "elite.rate_limit.enabled";
pub const RATE_LIMIT_MAX_REQUESTS_PROPERTY: &str = "elite.rate_limit.max_requests";
pub const RATE_LIMIT_WINDOW_SECS_PROPERTY: &str = "elite.rate_limit.window_secs";
pub const AUTH_RATE_LIMIT_MAX_ATTEMPTS_PROPERTY: &str = "elite.auth.rate_limit.max_attempts";
pub const AUTH_RATE_LIMIT_WINDOW_SECS_PROPERTY: &str = "elite.auth.rate_limit.window_secs";
pub const AUTH_RATE_LIMIT_LOCKOUT_SECS_PROPERTY: &str = "elite.auth.rate_limit.lockout_secs";

// Logging
pub const LOG_DIR_PROPERTY: &str = "elite.log.dir";
pub const LOG_LEVEL_PROPERTY: &str = "elite.log.level";
pub const LOG_CONSOLE_PROPERTY: &str = "elite.log.console";
pub const LOG_FILE_PROPERTY: &str = "elite.log.file";

// Metrics
pub const METRICS_ENABLED_PROPERTY: &str = "elite.metrics.enabled";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "ELITE";
pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
