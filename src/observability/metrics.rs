//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define engine metrics (resolution passes, fragment states, dispatch outcomes)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `ingress_resolutions_total` (counter): completed resolution passes
//! - `ingress_resolution_duration_seconds` (histogram): pass latency
//! - `ingress_fragments` (gauge): fragments by status (valid, invalid, orphaned)
//! - `ingress_virtual_hosts` (gauge): served virtual hosts
//! - `ingress_dispatch_total` (counter): dispatch decisions by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and the
//!   CLI pay nothing

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resolver::{FragmentState, Resolution};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_resolution(resolution: &Resolution, elapsed: Duration) {
    metrics::counter!("ingress_resolutions_total").increment(1);
    metrics::histogram!("ingress_resolution_duration_seconds").record(elapsed.as_secs_f64());
    metrics::gauge!("ingress_virtual_hosts").set(resolution.tables.len() as f64);

    for (state, label) in [
        (FragmentState::Valid, "valid"),
        (FragmentState::Invalid, "invalid"),
        (FragmentState::Orphaned, "orphaned"),
    ] {
        metrics::gauge!("ingress_fragments", "status" => label)
            .set(resolution.count_by_state(state) as f64);
    }
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("ingress_dispatch_total", "outcome" => outcome).increment(1);
}
