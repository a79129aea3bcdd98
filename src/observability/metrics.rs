//! Metrics collection and exposition.
//!
//! # Metrics
//! - `echo_requests_total` (counter): completed requests by method, status
//! - `echo_request_duration_seconds` (histogram): time from entry to completion
//! - `echo_in_flight_requests` (gauge): current in-flight count
//! - `echo_faults_total` (counter): injected faults by kind
//!
//! Without an installed recorder every call is a no-op, so tests and
//! metrics-disabled runs pay nothing.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Kinds of injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    PreHeaderDelay,
    PostHeaderDelay,
    ForcedStatus,
    Broken,
}

impl FaultKind {
    fn label(&self) -> &'static str {
        match self {
            FaultKind::PreHeaderDelay => "sleep",
            FaultKind::PostHeaderDelay => "sleep_ah",
            FaultKind::ForcedStatus => "http_code",
            FaultKind::Broken => "broken",
        }
    }
}

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "echo_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("echo_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn set_in_flight(count: i64) {
    gauge!("echo_in_flight_requests").set(count as f64);
}

pub fn record_fault(kind: FaultKind) {
    counter!("echo_faults_total", "kind" => kind.label()).increment(1);
}
