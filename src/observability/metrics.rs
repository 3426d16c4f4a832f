//! Metrics collection and exposition.
//!
//! # Metrics
//! - `surge_units_total` (counter): completed units by outcome
//! - `surge_unit_duration_seconds` (histogram): per-unit latency, retries included
//! - `surge_retries_total` (counter): extra attempts issued
//! - `surge_endpoint_rotations_total` (counter): endpoints handed out
//! - `surge_pool_exhaustions_total` (counter): contexts synthesized on an empty pool
//! - `surge_active_units` / `surge_queued_units` (gauges): dispatcher occupancy
//! - `surge_max_concurrency` / `surge_max_delay_ms` (gauges): current tunables
//! - `surge_requests_per_second` / `surge_success_ratio` (gauges): last tick
//!
//! Without an installed recorder every call is a no-op, which is what the
//! test suites rely on.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_unit(outcome: &'static str, start: Instant) {
    counter!("surge_units_total", "outcome" => outcome).increment(1);
    histogram!("surge_unit_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    counter!("surge_retries_total").increment(1);
}

pub fn record_rotation() {
    counter!("surge_endpoint_rotations_total").increment(1);
}

pub fn record_pool_exhaustion() {
    counter!("surge_pool_exhaustions_total").increment(1);
}

pub fn record_occupancy(active: usize, queued: usize) {
    gauge!("surge_active_units").set(active as f64);
    gauge!("surge_queued_units").set(queued as f64);
}

pub fn record_tunables(max_concurrency: usize, max_delay_ms: u64) {
    gauge!("surge_max_concurrency").set(max_concurrency as f64);
    gauge!("surge_max_delay_ms").set(max_delay_ms as f64);
}

pub fn record_throughput(requests_per_second: f64, success_ratio: f64) {
    gauge!("surge_requests_per_second").set(requests_per_second);
    gauge!("surge_success_ratio").set(success_ratio);
}
