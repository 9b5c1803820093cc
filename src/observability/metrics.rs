//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway route metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_active_routes` (gauge): routes in the current table
//! - `gateway_route_refresh_total` (counter): refresh signals published
//! - `gateway_route_rejected_total` (counter): rejected definitions by reason
//! - `gateway_config_fetch_total` (counter): initial fetches by outcome
//! - `gateway_route_reload_total` (counter): pushed payloads by outcome
//! - `gateway_config_subscribe_failures_total` (counter): failed subscriptions
//! - `gateway_route_resolution_total` (counter): lookups by matched/unmatched
//! - `gateway_admin_requests_total` (counter): admin calls by operation

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn set_active_routes(count: usize) {
    gauge!("gateway_active_routes").set(count as f64);
}

pub fn record_refresh_signal() {
    counter!("gateway_route_refresh_total").increment(1);
}

pub fn record_route_rejected(reason: &'static str) {
    counter!("gateway_route_rejected_total", "reason" => reason).increment(1);
}

pub fn record_config_fetch(outcome: &'static str) {
    counter!("gateway_config_fetch_total", "outcome" => outcome).increment(1);
}

pub fn record_subscribe_failure() {
    counter!("gateway_config_subscribe_failures_total").increment(1);
}

pub fn record_reload(outcome: &'static str) {
    counter!("gateway_route_reload_total", "outcome" => outcome).increment(1);
}

pub fn record_resolution(matched: bool) {
    let result = if matched { "matched" } else { "unmatched" };
    counter!("gateway_route_resolution_total", "result" => result).increment(1);
}

pub fn record_admin_request(operation: &'static str) {
    counter!("gateway_admin_requests_total", "operation" => operation).increment(1);
}
