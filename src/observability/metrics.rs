//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_requests_total` (counter): provider calls by operation, result
//! - `ledger_request_duration_seconds` (histogram): provider call latency by operation
//! - `submission_attempts_total` (counter): submission attempts by result
//! - `token_operations_total` (counter): mint / status updates by outcome
//! - `wallet_session_wait_seconds` (histogram): time spent queued behind the wallet lock
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one provider call.
pub fn record_ledger_request(operation: &'static str, result: &'static str, start: Instant) {
    counter!("ledger_requests_total", "operation" => operation, "result" => result).increment(1);
    histogram!("ledger_request_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

/// Record one submission attempt and how it ended.
pub fn record_submission_attempt(result: &'static str) {
    counter!("submission_attempts_total", "result" => result).increment(1);
}

/// Record the terminal outcome of a token operation.
pub fn record_token_operation(operation: &'static str, outcome: &'static str) {
    counter!("token_operations_total", "operation" => operation, "outcome" => outcome).increment(1);
}

pub fn record_session_wait(waited: Duration) {
    histogram!("wallet_session_wait_seconds").record(waited.as_secs_f64());
}
