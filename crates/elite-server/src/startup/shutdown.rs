//! Graceful shutdown handling
//!
//! SIGINT or SIGTERM stops the HTTP server from accepting connections and
//! gives in-flight requests up to the configured drain time to finish.

use std::time::Duration;

use actix_web::dev::Server;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Shutdown signal sender and receiver
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        let _ = self.sender.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut signal) => {
            signal.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Wait for Ctrl+C or SIGTERM in the background.
///
/// Returns the shutdown signal that fires when either arrives.
pub fn wait_for_shutdown_signal() -> ShutdownSignal {
    let shutdown = ShutdownSignal::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = ctrl_c() => info!("Received Ctrl+C, initiating graceful shutdown..."),
            _ = terminate() => info!("Received SIGTERM, initiating graceful shutdown..."),
        }
        shutdown_clone.shutdown();
    });

    shutdown
}

/// Runs the HTTP server until it exits or a shutdown signal arrives
pub struct GracefulShutdown {
    shutdown_signal: ShutdownSignal,
    shutdown_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(shutdown_signal: ShutdownSignal, shutdown_timeout: Duration) -> Self {
        Self {
            shutdown_signal,
            shutdown_timeout,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }

    /// Drive `server`. On shutdown the server stops accepting connections and
    /// waits for running requests, bounded by the drain timeout.
    pub async fn serve(&self, server: Server) -> std::io::Result<()> {
        let handle = server.handle();
        let mut receiver = self.shutdown_signal.subscribe();
        let mut server = actix_web::rt::spawn(server);

        tokio::select! {
            result = &mut server => {
                return result.map_err(std::io::Error::other)?;
            }
            _ = receiver.recv() => {
                info!(
                    "Shutdown initiated, waiting up to {:?} for connections to close...",
                    self.shutdown_timeout
                );
            }
        }

        let stop = handle.stop(true);
        if tokio::time::timeout(self.shutdown_timeout, stop).await.is_err() {
            warn!("Drain timeout elapsed, stopping with requests still open");
            handle.stop(false).await;
        }

        match server.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        let mut rx = signal.subscribe();

        let signal_clone = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signal_clone.shutdown();
        });

        let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
    }

    #[actix_web::test]
    async fn test_serve_stops_on_signal() {
        use actix_web::{App, HttpResponse, HttpServer, web};

        let server = HttpServer::new(|| App::new().route("/", web::get().to(HttpResponse::Ok)))
            .disable_signals()
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap()
            .run();

        let graceful = GracefulShutdown::new(ShutdownSignal::new(), Duration::from_secs(5));
        let signal = graceful.signal();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signal.shutdown();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), graceful.serve(server)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
