//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_breaker_rejections_total` (counter): calls refused by an open circuit
//! - `gateway_upstream_attempts_total` (counter): outbound attempts by backend, outcome
//! - `gateway_backend_health` (gauge): 1=connected, 0=disconnected
//! - `gateway_lookups_total` (counter): redirect lookups by serving tier
//! - `gateway_visit_increments_total` (counter): detached visit updates by outcome
//! - `gateway_requests_total` (counter): inbound requests by route, status

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_state(backend: &str, state: u8) {
    gauge!("gateway_breaker_state", "backend" => backend.to_string()).set(state as f64);
}

pub fn record_breaker_rejection(backend: &str) {
    counter!("gateway_breaker_rejections_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_upstream_attempt(backend: &str, outcome: &'static str) {
    counter!(
        "gateway_upstream_attempts_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_backend_health(backend: &str, connected: bool) {
    gauge!("gateway_backend_health", "backend" => backend.to_string())
        .set(if connected { 1.0 } else { 0.0 });
}

pub fn record_lookup(source: &'static str) {
    counter!("gateway_lookups_total", "source" => source).increment(1);
}

pub fn record_visit_increment(outcome: &'static str) {
    counter!("gateway_visit_increments_total", "outcome" => outcome).increment(1);
}

pub fn record_request(route: &'static str, status: u16) {
    counter!(
        "gateway_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}
