//! Metrics collection and exposition.
//!
//! # Metrics
//! - `server_requests_total` (counter): requests by method, status, outcome
//! - `server_request_duration_seconds` (histogram): dispatch latency
//! - `server_socket_events_total` (counter): socket events by event name
//!
//! # Design Decisions
//! - Low-overhead updates through the `metrics` facade
//! - Prometheus exporter bound on its own address, opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Install the Prometheus exporter. Call once, after the runtime is up.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!(address = %addr, "metrics exporter started"),
        Err(e) => error!(error = %e, "failed to start metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, outcome: &str, start: Instant) {
    counter!(
        "server_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
    histogram!("server_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one dispatched socket event.
pub fn record_socket_event(event: &str, status: u16) {
    counter!(
        "server_socket_events_total",
        "event" => event.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}
