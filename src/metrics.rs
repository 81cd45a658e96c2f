// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "feed_refresh_total",
        Unit::Count,
        "Refresh cycles, labeled by outcome (success, transport_error, conflict)."
    );
    describe_histogram!(
        "feed_refresh_duration_ms",
        "Wall-clock duration of a completed refresh cycle in milliseconds."
    );
    describe_counter!(
        "feed_decode_failures_total",
        Unit::Count,
        "Per-feed decode failures, labeled by batch kind (prices, reserves)."
    );
    describe_gauge!(
        "feed_snapshot_entries",
        "Number of entries in the last published snapshot, labeled by kind."
    );
    describe_gauge!(
        "feed_snapshot_block_number",
        "Source block number of the last published price snapshot."
    );
    describe_histogram!(
        "multicall_batch_size_bucket",
        "Number of unique calls sent in one aggregate request."
    );
    describe_counter!(
        "feed_query_failures_total",
        Unit::Count,
        "Best-effort single reads that failed, labeled by query."
    );
}

/// Starts the Prometheus scrape endpoint.
#[cfg(feature = "observability")]
pub fn install_exporter(listen: std::net::SocketAddr) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()?;
    describe_metrics();
    Ok(())
}

// --- Helper functions to update metrics ---

pub fn increment_refresh(outcome: &'static str) {
    counter!("feed_refresh_total", 1, "outcome" => outcome);
}

pub fn record_refresh_duration(duration: std::time::Duration) {
    histogram!("feed_refresh_duration_ms", duration.as_secs_f64() * 1000.0);
}

pub fn increment_decode_failures(kind: &'static str, count: u64) {
    counter!("feed_decode_failures_total", count, "kind" => kind);
}

pub fn set_snapshot_entries(kind: &'static str, count: f64) {
    gauge!("feed_snapshot_entries", count, "kind" => kind);
}

pub fn set_snapshot_block_number(block_number: u64) {
    gauge!("feed_snapshot_block_number", block_number as f64);
}

pub fn record_multicall_batch_size(size: f64) {
    histogram!("multicall_batch_size_bucket", size);
}

pub fn increment_query_failures(query: &'static str) {
    counter!("feed_query_failures_total", 1, "query" => query);
}
