//! Metrics for observability.
//!
//! Emits through the `metrics` facade; the embedding process installs the
//! recorder (Prometheus exporter or similar). Without one, every call is a
//! no-op.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `kv2sql_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! # Usage
//!
//! ```rust,no_run
//! use kv2sql::metrics;
//! use std::time::Duration;
//!
//! metrics::record_snapshot_batch("kv", 500);
//! metrics::record_write("kv", "upsert", Duration::from_micros(350));
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one snapshot batch written to the destination.
pub fn record_snapshot_batch(table: &str, records: usize) {
    counter!("kv2sql_snapshot_batches_total", "table" => table.to_string()).increment(1);
    counter!("kv2sql_snapshot_records_total", "table" => table.to_string())
        .increment(records as u64);
}

/// Record snapshot completion.
pub fn record_snapshot_complete(table: &str, records: u64, duration: Duration) {
    histogram!("kv2sql_snapshot_duration_seconds", "table" => table.to_string())
        .record(duration.as_secs_f64());
    gauge!("kv2sql_snapshot_size_records", "table" => table.to_string()).set(records as f64);
}

/// Record the consistency point the stream starts after.
pub fn set_consistency_point(table: &str, revision: i64) {
    gauge!("kv2sql_consistency_point_revision", "table" => table.to_string()).set(revision as f64);
}

/// Record stream events read from the source.
pub fn record_events_read(table: &str, count: usize) {
    counter!("kv2sql_events_read_total", "table" => table.to_string()).increment(count as u64);
}

/// Record an event applied to the destination.
pub fn record_event_applied(table: &str, kind: &str) {
    counter!(
        "kv2sql_events_applied_total",
        "table" => table.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record an event skipped (replayed revision or nothing to match).
pub fn record_event_skipped(table: &str, reason: &str) {
    counter!(
        "kv2sql_events_skipped_total",
        "table" => table.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record the last applied source revision.
pub fn set_last_applied_revision(table: &str, revision: i64) {
    gauge!("kv2sql_last_applied_revision", "table" => table.to_string()).set(revision as f64);
}

/// Record a destination write and its latency.
pub fn record_write(table: &str, operation: &str, duration: Duration) {
    counter!(
        "kv2sql_writes_total",
        "table" => table.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
    histogram!(
        "kv2sql_write_duration_seconds",
        "table" => table.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a terminal engine error by kind.
pub fn record_error(table: &str, error_kind: &str) {
    counter!("kv2sql_errors_total", "table" => table.to_string(), "kind" => error_kind.to_string())
        .increment(1);
}

/// Gauge for engine state.
pub fn set_engine_state(state: &str) {
    // Encoded as numeric for alerting
    let value = match state {
        "Created" => 0.0,
        "Preparing" => 1.0,
        "Snapshotting" => 2.0,
        "Streaming" => 3.0,
        "Stopped" => 4.0,
        "Cancelled" => 5.0,
        "Failed" => 6.0,
        _ => -1.0,
    };
    gauge!("kv2sql_engine_state").set(value);
}
