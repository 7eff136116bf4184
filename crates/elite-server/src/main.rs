//! Main entry point for the EliteSolution financial API server.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use elite_auth::LogNotifier;
use elite_persistence::{
    EmbeddedPersistService, ExternalDbPersistService, PersistenceService, StorageMode,
};
use elite_server::{
    middleware::rate_limit::{RateLimiterState, start_cleanup_task},
    model::{AppState, Cli, Command, Configuration},
    startup::{self, GracefulShutdown},
};
use tracing::info;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Healthcheck { url, timeout_secs }) = &cli.command {
        let port = cli.port.unwrap_or(elite_server::model::constants::DEFAULT_SERVER_PORT);
        let url = url.clone().unwrap_or_else(|| startup::default_health_url(port));
        match startup::check_health(&url, Duration::from_secs(*timeout_secs)).await {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("unhealthy: {}", e);
                std::process::exit(1);
            }
        }
    }

    let configuration = Configuration::load(&cli)?;
    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    let metrics_handle = if configuration.metrics_enabled() {
        let handle = elite_server::metrics::install_recorder();
        if handle.is_some() {
            elite_server::metrics::init_metrics();
        }
        handle
    } else {
        None
    };

    let storage_mode = configuration.persistence_mode();
    info!("Persistence mode: {}", storage_mode);
    let persistence: Arc<dyn PersistenceService> = match storage_mode {
        StorageMode::ExternalDb => {
            let db = configuration.database_connection().await?;
            let service = ExternalDbPersistService::new(db);
            service.init_schema().await?;
            Arc::new(service)
        }
        StorageMode::Embedded => {
            let data_dir = configuration.embedded_data_dir();
            info!("Initializing embedded storage at: {}", data_dir);
            Arc::new(EmbeddedPersistService::open(&data_dir)?)
        }
    };

    let notifier = Arc::new(LogNotifier::new(configuration.otp_log_codes()));
    let mut app_state = AppState::new(configuration.clone(), persistence, notifier);
    if let Some(handle) = metrics_handle {
        app_state = app_state.with_metrics(handle);
    }
    app_state.uploads.ensure_dirs()?;
    info!(root = %app_state.uploads.root().display(), "Upload directories ready");

    let rate_limiter_state = Arc::new(RateLimiterState::new(configuration.rate_limit_config()));
    let _rate_limit_cleanup_handle =
        start_cleanup_task(rate_limiter_state.clone(), app_state.auth_rate_limiter.clone());

    let address = configuration.server_address();
    let port = configuration.server_port();
    let shutdown_timeout = configuration.shutdown_timeout();
    info!("Starting EliteSolution API on {}:{}", address, port);

    let server = startup::main_server(
        app_state,
        rate_limiter_state,
        address,
        port,
        configuration.server_workers(),
        shutdown_timeout,
    )?;

    let shutdown = GracefulShutdown::new(startup::wait_for_shutdown_signal(), shutdown_timeout);
    shutdown.serve(server).await?;

    info!("Server stopped");
    Ok(())
}
