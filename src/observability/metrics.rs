//! Metrics collection and exposition.
//!
//! # Metrics
//! - `matcher_lookups_total` (counter): lookups by `outcome` (matched / reason)
//! - `matcher_cache_recomputations_total` (counter): re-ranks by `result`
//!   (published / discarded)
//! - `matcher_registered_routes` (gauge): current registry size
//! - `matcher_config_reloads_total` (counter): reload attempts by `outcome`
//!   (applied / partial / rejected)
//! - `matcher_requests_total` (counter): HTTP requests by method, status
//! - `matcher_request_duration_seconds` (histogram): HTTP handling latency
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are static strings on the lookup path

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::matcher::MismatchReason;

/// Install the Prometheus recorder with its own HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_match() {
    metrics::counter!("matcher_lookups_total", "outcome" => "matched").increment(1);
}

pub fn record_no_match(last_mismatch: Option<MismatchReason>) {
    let outcome = last_mismatch.map(|r| r.as_str()).unwrap_or("EMPTY");
    metrics::counter!("matcher_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_recompute(published: bool) {
    let result = if published { "published" } else { "discarded" };
    metrics::counter!("matcher_cache_recomputations_total", "result" => result).increment(1);
}

pub fn record_config_reload(outcome: &'static str) {
    metrics::counter!("matcher_config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_registered_routes(count: usize) {
    metrics::gauge!("matcher_registered_routes").set(count as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "matcher_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        "matcher_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}
