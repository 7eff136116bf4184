//! Multi-file logging.
//!
//! Every event goes to the console and to `elite.log`. Events are additionally
//! routed by their `tracing` target into one file per component:
//!
//! | Log File          | Component                   | Target Prefixes                                  |
//! |-------------------|-----------------------------|--------------------------------------------------|
//! | elite.log         | Root logger (all events)    | (all)                                            |
//! | auth.log          | Credentials, OTP and PIN    | elite_auth, elite_server::api::auth              |
//! | ledger.log        | Money movement              | elite_server::service::ledger                    |
//! | persistence.log   | Storage backends            | elite_persistence                                |
//! | http.log          | Routes and middleware       | elite_server::api, elite_server::middleware      |
//!
//! Files are written to `logs/` unless `ELITE_LOG_DIR` or `elite.log.dir`
//! says otherwise.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const DEFAULT_LOG_DIR: &str = "logs";
const ROOT_LOG_FILE: &str = "elite.log";

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "auth.log",
        targets: &["elite_auth", "elite_server::api::auth", "elite_server::api::pin"],
    },
    ComponentLogDef {
        file_name: "ledger.log",
        targets: &["elite_server::service::ledger", "elite_server::api::transactions"],
    },
    ComponentLogDef {
        file_name: "persistence.log",
        targets: &["elite_persistence"],
    },
    ComponentLogDef {
        file_name: "http.log",
        targets: &["elite_server::api", "elite_server::middleware"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

impl std::str::FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(LogRotation::Daily),
            "hourly" => Ok(LogRotation::Hourly),
            "never" => Ok(LogRotation::Never),
            _ => Err(format!("Invalid log rotation: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            console_output: true,
            console_level: Level::INFO,
            file_logging: true,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

impl LoggingConfig {
    /// Read `ELITE_LOG_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let console_level = std::env::var("ELITE_LOG_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.console_level);

        Self {
            log_dir: std::env::var("ELITE_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            console_output: env_flag("ELITE_LOG_CONSOLE").unwrap_or(defaults.console_output),
            console_level,
            file_logging: env_flag("ELITE_LOG_FILE").unwrap_or(defaults.file_logging),
            file_level: std::env::var("ELITE_LOG_FILE_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(console_level),
            rotation: std::env::var("ELITE_LOG_ROTATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rotation),
        }
    }
}

/// Keeps the non-blocking file writers alive. Dropping it flushes them.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the console and root file levels. Component files
/// capture everything their targets emit.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, Box<dyn std::error::Error>> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(root_filter);
        layers.push(Box::new(root_layer));

        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let mut targets = Targets::new();
            for target in component.targets {
                targets = targets.with_target(*target, LevelFilter::from_level(config.file_level));
            }

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_ansi(false)
                .with_filter(targets);
            layers.push(Box::new(layer));
        }
    }

    // try_init also installs the log -> tracing bridge for actix's `log` records
    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            component_files = COMPONENT_LOGS.len(),
            "File logging initialized"
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
