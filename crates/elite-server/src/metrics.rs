// Metrics module for observability
// Counters and histograms are recorded through the `metrics` facade and
// rendered by the Prometheus recorder at GET /metrics.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize all metric descriptions
/// Should be called once at application startup, after the recorder is installed
pub fn init_metrics() {
    // HTTP
    describe_counter!(
        "elite_http_requests_total",
        "Total number of HTTP requests by method and status"
    );
    describe_histogram!(
        "elite_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "elite_rate_limited_total",
        "Requests refused by the request or credential rate limiter"
    );

    // Auth
    describe_counter!("elite_otp_issued_total", "One-time passwords issued by purpose");

    // Ledger
    describe_counter!(
        "elite_ledger_postings_total",
        "Transactions written by kind and status"
    );
    describe_counter!(
        "elite_ledger_flagged_total",
        "Transactions above the large amount threshold"
    );
    describe_counter!(
        "elite_ledger_settlements_total",
        "Pending transactions approved or rejected"
    );

    // KYC and admin
    describe_counter!("elite_kyc_submissions_total", "KYC applications submitted");
    describe_counter!("elite_kyc_reviews_total", "KYC applications reviewed by outcome");
    describe_counter!("elite_audit_entries_total", "Audit log entries by action");

    tracing::info!("Metrics initialized");
}

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns `None` when a recorder is already installed (e.g. a second server
/// in the same process).
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_recorder_renders_descriptions() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            init_metrics();
            metrics::counter!("elite_otp_issued_total", "purpose" => "LOGIN").increment(2);
        });
        let rendered = handle.render();
        assert!(rendered.contains("elite_otp_issued_total"));
        assert!(rendered.contains("purpose=\"LOGIN\""));
    }
}
