//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method and client status
//! - `proxy_request_duration_seconds` (histogram): time until the response head
//! - `proxy_upstream_errors_total` (counter): upstream connect/transport failures
//! - `proxy_relayed_lines_total` (counter): segments flushed to clients
//! - `proxy_relay_interrupted_total` (counter): body copies cut short, by stage
//!
//! # Design Decisions
//! - Recording is always on; exporting is opt-in, and a failed exporter is fatal
//! - Head latency only: streamed bodies can legitimately run for hours

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::http::error::RelayStage;

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Fails when the listener cannot be bound or a recorder is already installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    counter!("proxy_upstream_errors_total").increment(1);
}

pub fn record_relayed(segments: u64) {
    counter!("proxy_relayed_lines_total").increment(segments);
}

pub fn record_interrupted(stage: RelayStage) {
    counter!("proxy_relay_interrupted_total", "stage" => stage.as_str()).increment(1);
}
