//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by stage, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by stage
//! - `gateway_handler_failures_total` (counter): errors caught by the boundary
//! - `gateway_cors_denied_total` (counter): requests rejected by origin
//! - `gateway_websocket_sessions_total` (counter): relayed WebSocket sessions by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter only when `observability.metrics_enabled`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request for `stage` (`proxy`, `api`).
pub fn record_request(stage: &'static str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "stage" => stage,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("gateway_request_duration_seconds", "stage" => stage)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_handler_failure(error_name: &str) {
    counter!("gateway_handler_failures_total", "error" => error_name.to_string()).increment(1);
}

pub fn record_cors_denied() {
    counter!("gateway_cors_denied_total").increment(1);
}

pub fn record_websocket_session(outcome: &'static str) {
    counter!("gateway_websocket_sessions_total", "outcome" => outcome).increment(1);
}
