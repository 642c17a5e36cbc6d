//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_dispatch_total` (counter): dispatches by outcome
//! - `router_dispatch_duration_seconds` (histogram): dispatch latency by outcome
//! - `router_errors_total` (counter): contained or rethrown errors by label
//! - `router_root_builds_total` (counter): root table (re)builds
//! - `router_root_rules` (gauge): rules in the current root table
//!
//! # Design Decisions
//! - Recording functions are no-ops until an exporter is installed
//! - Labels are static strings only; paths never become labels

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const DISPATCH_TOTAL: &str = "router_dispatch_total";
pub const DISPATCH_DURATION_SECONDS: &str = "router_dispatch_duration_seconds";
pub const ERRORS_TOTAL: &str = "router_errors_total";
pub const ROOT_BUILDS_TOTAL: &str = "router_root_builds_total";
pub const ROOT_RULES: &str = "router_root_rules";

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished dispatch.
#[inline]
pub fn record_dispatch(outcome: &'static str, started: Instant) {
    counter!(DISPATCH_TOTAL, "outcome" => outcome).increment(1);
    histogram!(DISPATCH_DURATION_SECONDS, "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

#[inline]
pub fn record_error(label: &'static str) {
    counter!(ERRORS_TOTAL, "label" => label).increment(1);
}

#[inline]
pub fn record_root_build(rules: usize) {
    counter!(ROOT_BUILDS_TOTAL).increment(1);
    gauge!(ROOT_RULES).set(rules as f64);
}
