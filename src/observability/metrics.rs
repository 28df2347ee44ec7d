//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method, status, target kind
//! - `relay_request_duration_seconds` (histogram): latency by target kind
//! - `relay_html_rewrites_total` (counter): documents rewritten
//! - `relay_html_bytes` (histogram): rewritten document size
//! - `relay_upstream_errors_total` (counter): failed upstream calls
//!
//! # Design Decisions
//! - Metric macros are no-ops until a recorder is installed
//! - The Prometheus exporter is optional and owns its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, kind: &'static str, start: Instant) {
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "kind" => kind
    )
    .increment(1);
    histogram!("relay_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_html_rewrite(original_len: usize, rewritten_len: usize) {
    counter!("relay_html_rewrites_total").increment(1);
    histogram!("relay_html_bytes", "stage" => "original").record(original_len as f64);
    histogram!("relay_html_bytes", "stage" => "rewritten").record(rewritten_len as f64);
}

pub fn record_upstream_error() {
    counter!("relay_upstream_errors_total").increment(1);
}
