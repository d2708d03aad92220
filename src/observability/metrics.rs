//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): served connections by outcome
//! - `proxy_relay_duration_seconds` (histogram): time from dequeue to close
//! - `proxy_diagnostics_total` (counter): diagnostics sent, by code
//! - `proxy_response_bytes_total` (counter): bytes relayed back to clients
//! - `proxy_queue_depth` (gauge): connections waiting for a worker
//! - `proxy_worker_panics_total` (counter): relays that panicked

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection(outcome: &'static str, started: Instant) {
    metrics::counter!("proxy_connections_total", "outcome" => outcome).increment(1);
    metrics::histogram!("proxy_relay_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_diagnostic(code: u16) {
    metrics::counter!("proxy_diagnostics_total", "code" => code.to_string()).increment(1);
}

pub fn record_response_bytes(bytes: u64) {
    metrics::counter!("proxy_response_bytes_total").increment(bytes);
}

pub fn record_queue_depth(depth: usize) {
    metrics::gauge!("proxy_queue_depth").set(depth as f64);
}

pub fn record_worker_panic() {
    metrics::counter!("proxy_worker_panics_total").increment(1);
}
