//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests entering the pipeline
//! - `guard_rejections_total` (counter): rejections by filter and status
//! - `guard_store_conflicts_total` (counter): lost compare-and-set races
//! - `guard_store_errors_total` (counter): store failures by operation
//! - `guard_retry_exhausted_total` (counter): rate checks that ran out of attempts
//! - `guard_store_evictions_total` (counter): idle store entries reclaimed
//!
//! Recording is a no-op until a recorder is installed, so the library can be used
//! without the Prometheus endpoint.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request() {
    metrics::counter!("guard_requests_total").increment(1);
}

pub fn record_rejection(filter: &'static str, status: u16) {
    metrics::counter!(
        "guard_rejections_total",
        "filter" => filter,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_store_conflict() {
    metrics::counter!("guard_store_conflicts_total").increment(1);
}

pub fn record_store_error(operation: &'static str) {
    metrics::counter!("guard_store_errors_total", "operation" => operation).increment(1);
}

pub fn record_retry_exhausted() {
    metrics::counter!("guard_retry_exhausted_total").increment(1);
}

pub fn record_store_evictions(count: usize) {
    metrics::counter!("guard_store_evictions_total").increment(count as u64);
}
