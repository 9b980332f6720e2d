//! Metrics collection and exposition.
//!
//! # Metrics
//! - `loadtrace_samples_buffered_total` (counter): HTTP trails accepted
//! - `loadtrace_records_skipped_total` (counter): trails left out of a batch, by reason
//! - `loadtrace_batches_exported_total` (counter): batches accepted by the collector
//! - `loadtrace_records_exported_total` (counter): records in accepted batches
//! - `loadtrace_payload_bytes_total` (counter): bytes uploaded successfully
//! - `loadtrace_batches_dropped_total` (counter): batches lost, by reason
//! - `loadtrace_records_dropped_total` (counter): records in lost batches, by reason

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_samples_buffered(count: usize) {
    counter!("loadtrace_samples_buffered_total").increment(count as u64);
}

pub fn record_record_skipped(reason: &'static str) {
    counter!("loadtrace_records_skipped_total", "reason" => reason).increment(1);
}

pub fn record_batch_exported(records: usize, bytes: usize) {
    counter!("loadtrace_batches_exported_total").increment(1);
    counter!("loadtrace_records_exported_total").increment(records as u64);
    counter!("loadtrace_payload_bytes_total").increment(bytes as u64);
}

pub fn record_batch_dropped(reason: &'static str, records: usize) {
    counter!("loadtrace_batches_dropped_total", "reason" => reason).increment(1);
    counter!("loadtrace_records_dropped_total", "reason" => reason).increment(records as u64);
}
