//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tunnel_requests_total` (counter): requests by kind, status
//! - `tunnel_request_duration_seconds` (histogram): latency by kind
//! - `tunnel_sessions_created_total` (counter)
//! - `tunnel_sessions_active` (gauge)
//! - `tunnel_handler_failures_total` (counter)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "tunnel_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("tunnel_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_session_created() {
    metrics::counter!("tunnel_sessions_created_total").increment(1);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("tunnel_sessions_active").set(count as f64);
}

pub fn record_handler_failure() {
    metrics::counter!("tunnel_handler_failures_total").increment(1);
}
