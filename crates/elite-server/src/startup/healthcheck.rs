//! Container health check
//!
//! `elite-server healthcheck` calls `/health` on the running server and turns
//! the answer into an exit code, so the image needs no curl.

use std::time::Duration;

use elite_common::EliteError;

pub const HEALTH_PATH: &str = "/health";

/// URL checked when none is given on the command line
pub fn default_health_url(port: u16) -> String {
    format!("http://127.0.0.1:{}{}", port, HEALTH_PATH)
}

/// Succeeds only on HTTP 200 within `timeout`
pub async fn check_health(url: &str, timeout: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client.get(url).send().await?;
    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(EliteError::InternalError(format!("health check returned {}: {}", status, body)).into());
    }
    Ok(())
}
