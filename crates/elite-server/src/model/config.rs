//! Configuration management for the Elite server
//!
//! Values come from `conf/application.yml`, then `ELITE__*` environment
//! variables, then command line arguments, each overriding the previous one.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment};
use elite_auth::model::{
    DEFAULT_OTP_EXPIRY_MINUTES, DEFAULT_OTP_MAX_DAILY, DEFAULT_OTP_MAX_FAILED_ATTEMPTS,
    DEFAULT_PIN_LOCK_MINUTES, DEFAULT_PIN_MAX_ATTEMPTS, DEFAULT_TOKEN_EXPIRE_MINUTES,
    OTP_EXPIRY_MINUTES, OTP_LOG_CODES, OTP_MAX_DAILY, OTP_MAX_FAILED_ATTEMPTS, PIN_LOCK_MINUTES,
    PIN_MAX_ATTEMPTS, TOKEN_EXPIRE_MINUTES, TOKEN_SECRET_KEY,
};
use elite_auth::service::otp::OtpSettings;
use elite_auth::service::pin::PinSettings;
use elite_common::EliteError;
use elite_persistence::StorageMode;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::middleware::rate_limit::{AuthRateLimitConfig, RateLimitConfig};
use crate::service::ledger::LedgerSettings;
use crate::startup::LoggingConfig;

use super::constants::*;

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "elite-server", version, about = "EliteSolution Financial API server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,

    #[arg(long = "db-url", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long = "secret-key", env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(short = 'p', long = "port", env = "PORT")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Check a running server's /health endpoint and exit 0 when healthy
    Healthcheck {
        /// Full URL to check; defaults to the local server
        #[arg(long)]
        url: Option<String>,
        #[arg(long = "timeout-secs", default_value_t = 30)]
        timeout_secs: u64,
    },
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Build the configuration for the given command line.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name(&cli.config_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .keep_prefix(true)
                    .try_parsing(true),
            );

        if let Some(v) = &cli.database_url {
            builder = builder.set_override(DB_URL_PROPERTY, v.as_str())?;
        }
        if let Some(v) = &cli.secret_key {
            builder = builder.set_override(TOKEN_SECRET_KEY, v.as_str())?;
        }
        if let Some(v) = cli.port {
            builder = builder.set_override(SERVER_PORT_PROPERTY, i64::from(v))?;
        }

        let configuration = Configuration {
            config: builder.build()?,
        };
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    /// Fails fast on settings the server cannot run without.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_secret_key().trim().is_empty() {
            return Err(EliteError::ConfigError(format!(
                "{} must be set (SECRET_KEY or ELITE__AUTH__SECRET_KEY)",
                TOKEN_SECRET_KEY
            ))
            .into());
        }
        if self.persistence_mode() == StorageMode::ExternalDb
            && self.config.get_string(DB_URL_PROPERTY).is_err()
        {
            return Err(EliteError::ConfigError(format!(
                "{} is required for external_db persistence",
                DB_URL_PROPERTY
            ))
            .into());
        }
        Ok(())
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS_PROPERTY)
            .unwrap_or(DEFAULT_SERVER_ADDRESS.to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int(SERVER_PORT_PROPERTY)
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn server_workers(&self) -> Option<usize> {
        self.config
            .get_int(SERVER_WORKERS_PROPERTY)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .filter(|v| *v > 0)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int(SHUTDOWN_TIMEOUT_PROPERTY)
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        )
    }

    // ========================================================================
    // Auth Configuration
    // ========================================================================

    pub fn token_secret_key(&self) -> String {
        self.config.get_string(TOKEN_SECRET_KEY).unwrap_or_default()
    }

    pub fn token_expire_seconds(&self) -> i64 {
        self.config
            .get_int(TOKEN_EXPIRE_MINUTES)
            .unwrap_or(DEFAULT_TOKEN_EXPIRE_MINUTES)
            * 60
    }

    pub fn otp_settings(&self) -> OtpSettings {
        OtpSettings {
            expiry_minutes: self
                .config
                .get_int(OTP_EXPIRY_MINUTES)
                .unwrap_or(DEFAULT_OTP_EXPIRY_MINUTES),
            max_daily: self
                .config
                .get_int(OTP_MAX_DAILY)
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(DEFAULT_OTP_MAX_DAILY),
            max_failed_attempts: self
                .config
                .get_int(OTP_MAX_FAILED_ATTEMPTS)
                .ok()
                .and_then(|v| i32::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_OTP_MAX_FAILED_ATTEMPTS),
        }
    }

    /// Whether OTP codes are written to the log in clear text
    pub fn otp_log_codes(&self) -> bool {
        self.config.get_bool(OTP_LOG_CODES).unwrap_or(false)
    }

    pub fn pin_settings(&self) -> PinSettings {
        PinSettings {
            max_attempts: self
                .config
                .get_int(PIN_MAX_ATTEMPTS)
                .ok()
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(DEFAULT_PIN_MAX_ATTEMPTS),
            lock_minutes: self
                .config
                .get_int(PIN_LOCK_MINUTES)
                .unwrap_or(DEFAULT_PIN_LOCK_MINUTES),
        }
    }

    pub fn admin_registration_enabled(&self) -> bool {
        self.config
            .get_bool(ADMIN_REGISTRATION_ENABLED_PROPERTY)
            .unwrap_or(false)
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let defaults = RateLimitConfig::default();
        RateLimitConfig {
            max_requests: self
                .config
                .get_int(RATE_LIMIT_MAX_REQUESTS_PROPERTY)
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_requests),
            window_duration: self
                .duration_secs(RATE_LIMIT_WINDOW_SECS_PROPERTY)
                .unwrap_or(defaults.window_duration),
            enabled: self
                .config
                .get_bool(RATE_LIMIT_ENABLED_PROPERTY)
                .unwrap_or(defaults.enabled),
        }
    }

    pub fn auth_rate_limit_config(&self) -> AuthRateLimitConfig {
        let defaults = AuthRateLimitConfig::default();
        AuthRateLimitConfig {
            max_attempts: self
                .config
                .get_int(AUTH_RATE_LIMIT_MAX_ATTEMPTS_PROPERTY)
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_attempts),
            window_duration: self
                .duration_secs(AUTH_RATE_LIMIT_WINDOW_SECS_PROPERTY)
                .unwrap_or(defaults.window_duration),
            lockout_duration: self
                .duration_secs(AUTH_RATE_LIMIT_LOCKOUT_SECS_PROPERTY)
                .unwrap_or(defaults.lockout_duration),
            enabled: defaults.enabled,
        }
    }

    // ========================================================================
    // Ledger and Uploads
    // ========================================================================

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            transaction_limit_cents: self
                .config
                .get_int(TRANSACTION_LIMIT_PROPERTY)
                .unwrap_or(DEFAULT_TRANSACTION_LIMIT_CENTS),
            large_transaction_cents: self
                .config
                .get_int(LARGE_TRANSACTION_PROPERTY)
                .unwrap_or(DEFAULT_LARGE_TRANSACTION_CENTS),
        }
    }

    pub fn upload_root(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .get_string(UPLOAD_ROOT_PROPERTY)
                .unwrap_or(DEFAULT_UPLOAD_ROOT.to_string()),
        )
    }

    pub fn upload_max_file_size(&self) -> usize {
        self.config
            .get_int(UPLOAD_MAX_FILE_SIZE_PROPERTY)
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(DEFAULT_UPLOAD_MAX_FILE_SIZE)
    }

    // ========================================================================
    // Logging and Metrics
    // ========================================================================

    /// Logging settings. `ELITE_LOG_*` environment variables win over the file.
    pub fn logging_config(&self) -> LoggingConfig {
        let from_env = LoggingConfig::from_env();
        LoggingConfig {
            log_dir: std::env::var("ELITE_LOG_DIR")
                .ok()
                .or_else(|| self.config.get_string(LOG_DIR_PROPERTY).ok())
                .map(PathBuf::from)
                .unwrap_or(from_env.log_dir),
            console_output: self
                .config
                .get_bool(LOG_CONSOLE_PROPERTY)
                .unwrap_or(from_env.console_output),
            console_level: std::env::var("ELITE_LOG_LEVEL")
                .ok()
                .or_else(|| self.config.get_string(LOG_LEVEL_PROPERTY).ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(from_env.console_level),
            file_logging: self
                .config
                .get_bool(LOG_FILE_PROPERTY)
                .unwrap_or(from_env.file_logging),
            ..from_env
        }
    }

    pub fn metrics_enabled(&self) -> bool {
        self.config.get_bool(METRICS_ENABLED_PROPERTY).unwrap_or(true)
    }

    // ========================================================================
    // Persistence Configuration
    // ========================================================================

    /// Storage backend. Defaults to embedded unless a database URL is given.
    pub fn persistence_mode(&self) -> StorageMode {
        match self.config.get_string(PERSISTENCE_MODE_PROPERTY) {
            Ok(mode) => mode.parse().unwrap_or(StorageMode::Embedded),
            Err(_) if self.config.get_string(DB_URL_PROPERTY).is_ok() => StorageMode::ExternalDb,
            Err(_) => StorageMode::Embedded,
        }
    }

    pub fn embedded_data_dir(&self) -> String {
        self.config
            .get_string(EMBEDDED_DATA_DIR_PROPERTY)
            .unwrap_or(DEFAULT_EMBEDDED_DATA_DIR.to_string())
    }

    pub async fn database_connection(&self) -> anyhow::Result<DatabaseConnection> {
        let max_connections = self
            .config
            .get_int("db.pool.max_connections")
            .unwrap_or(20) as u32;
        let min_connections = self
            .config
            .get_int("db.pool.min_connections")
            .unwrap_or(1) as u32;
        let connect_timeout = self
            .config
            .get_int("db.pool.connect_timeout_secs")
            .unwrap_or(30) as u64;
        let acquire_timeout = self
            .config
            .get_int("db.pool.acquire_timeout_secs")
            .unwrap_or(8) as u64;
        let idle_timeout = self
            .config
            .get_int("db.pool.idle_timeout_secs")
            .unwrap_or(300) as u64;
        let sqlx_logging = self
            .config
            .get_bool("db.pool.sqlx_logging")
            .unwrap_or(false);

        let url = self.config.get_string(DB_URL_PROPERTY)?;

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .acquire_timeout(Duration::from_secs(acquire_timeout))
            .idle_timeout(Duration::from_secs(idle_timeout))
            .sqlx_logging(sqlx_logging);

        tracing::info!(
            max_connections,
            min_connections,
            connect_timeout,
            idle_timeout,
            sqlx_logging,
            "Database connection pool configured"
        );

        Ok(Database::connect(opt).await?)
    }

    fn duration_secs(&self, key: &str) -> Option<Duration> {
        self.config
            .get_int(key)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .map(Duration::from_secs)
    }
}
