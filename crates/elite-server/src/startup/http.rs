//! HTTP server setup.

use std::{sync::Arc, time::Duration};

use actix_web::{
    App, HttpServer,
    dev::Server,
    middleware::{Logger, NormalizePath, TrailingSlash},
    web,
};
use elite_common::EliteError;

use crate::{
    api,
    error::AppError,
    middleware::{
        auth::Authentication,
        rate_limit::{RateLimiter, RateLimiterState},
        tracing::TracingMiddleware,
    },
    model::AppState,
};

const JSON_BODY_LIMIT: usize = 256 * 1024;

/// Malformed JSON bodies are answered in the response envelope
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| {
            AppError::from(EliteError::IllegalArgument(format!("Invalid request body: {}", err))).into()
        })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::from(EliteError::IllegalArgument(format!("Invalid query string: {}", err))).into()
    })
}

/// Registers every route of the API.
///
/// Shared by [`main_server`] and the integration tests so both serve the same
/// surface.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .configure(api::health::configure)
        .configure(api::metrics::configure)
        .service(api::files::routes())
        .service(api::uploads::routes())
        .service(api::auth::routes())
        .service(api::otp::routes())
        .service(api::pin::routes())
        .service(api::accounts::routes())
        .service(api::transactions::routes())
        .service(api::profile::routes())
        .service(api::withdrawal_accounts::routes())
        .service(api::admin::route::routes());
}

/// Creates and binds the API server.
///
/// Signals are not handled here; [`GracefulShutdown`](super::GracefulShutdown)
/// stops the returned server.
pub fn main_server(
    app_state: AppState,
    rate_limiter_state: Arc<RateLimiterState>,
    address: String,
    port: u16,
    workers: Option<usize>,
    shutdown_timeout: Duration,
) -> Result<Server, std::io::Error> {
    let app_state = web::Data::new(app_state);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Authentication)
            .wrap(RateLimiter::from_state(rate_limiter_state.clone()))
            .wrap(TracingMiddleware)
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(configure_routes)
    })
    .disable_signals()
    .shutdown_timeout(shutdown_timeout.as_secs());

    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    Ok(server.bind((address, port))?.run())
}
