//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reputation_checks_total` (counter): checks by outcome
//! - `reputation_check_duration_seconds` (histogram): serving latency
//! - `reputation_cache_lookups_total` (counter): hit / miss / error
//! - `reputation_cache_entries` (gauge): entries currently stored
//! - `reputation_source_calls_total` (counter): per source and outcome
//! - `reputation_source_retries_total` (counter): per source
//! - `reputation_ingress_rejections_total` (counter)
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_check(outcome: &'static str, start: Instant) {
    metrics::counter!("reputation_checks_total", "outcome" => outcome).increment(1);
    metrics::histogram!("reputation_check_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("reputation_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("reputation_cache_entries").set(entries as f64);
}

pub fn record_source_call(source: &str, outcome: &'static str) {
    metrics::counter!(
        "reputation_source_calls_total",
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_source_retry(source: &str) {
    metrics::counter!("reputation_source_retries_total", "source" => source.to_string()).increment(1);
}

pub fn record_ingress_rejected() {
    metrics::counter!("reputation_ingress_rejections_total").increment(1);
}
