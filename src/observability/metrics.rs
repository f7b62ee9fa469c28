//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, outcome
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_rejections_total` (counter): gate rejections by kind
//! - `proxy_forward_failures_total` (counter): upstream failures by kind
//! - `proxy_in_flight_requests` (gauge): requests inside the pipeline
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus listener is installed only when an address is configured

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0,
];

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("proxy_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished proxied request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, started: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

/// Record a gate rejection.
pub fn record_rejection(kind: &'static str) {
    ::metrics::counter!("proxy_rejections_total", "kind" => kind).increment(1);
}

/// Record an upstream failure (timeout, transport, internal).
pub fn record_forward_failure(kind: &'static str) {
    ::metrics::counter!("proxy_forward_failures_total", "kind" => kind).increment(1);
}

pub fn set_in_flight(count: u64) {
    ::metrics::gauge!("proxy_in_flight_requests").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_request("GET", 200, "forwarded", Instant::now());
        record_rejection("rate_limited");
        record_forward_failure("timeout");
        set_in_flight(3);
    }
}
