//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, sessions, events)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by router layer, method, status
//! - `edge_request_duration_seconds` (histogram): latency by router layer
//! - `edge_sessions_minted_total` (counter): identifiers handed out
//! - `edge_sessions_active` (gauge): session units alive in the registry
//! - `edge_session_events_total` (counter): events recorded by all units
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one routed request.
///
/// `status` is the numeric status, or `none` when a handler produced no response.
pub fn record_request(layer: &'static str, method: &str, status: &str, start: Instant) {
    ::metrics::counter!(
        "edge_requests_total",
        "layer" => layer,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("edge_request_duration_seconds", "layer" => layer)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_session_minted() {
    ::metrics::counter!("edge_sessions_minted_total").increment(1);
}

pub fn record_active_sessions(count: usize) {
    ::metrics::gauge!("edge_sessions_active").set(count as f64);
}

pub fn record_session_event() {
    ::metrics::counter!("edge_session_events_total").increment(1);
}
