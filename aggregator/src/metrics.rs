//! Prometheus metrics for the aggregator service

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram,
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

// ── Ingestion metrics ────────────────────────────────────────────────────────

pub static INSERT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spanstat_insert_total",
        "Total InsertEvents calls",
        &["status"]
    )
    .unwrap()
});

pub static EVENTS_INGESTED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spanstat_events_ingested_total",
        "Raw events merged into the write-back buffer"
    )
    .unwrap()
});

// ── Buffer / flush metrics ───────────────────────────────────────────────────

pub static BUFFER_KEYS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "spanstat_buffer_keys",
        "Distinct aggregation keys currently buffered"
    )
    .unwrap()
});

pub static FLUSH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spanstat_flush_total",
        "Flush attempts by trigger and outcome",
        &["trigger", "status"]
    )
    .unwrap()
});

pub static FLUSH_ROWS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spanstat_flush_rows_total",
        "Aggregate rows written to the store"
    )
    .unwrap()
});

pub static FLUSH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "spanstat_flush_duration_seconds",
        "Batch write latency",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap()
});

pub static FLUSH_DISCARDED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "spanstat_flush_discarded_total",
        "Aggregates dropped after a failed flush"
    )
    .unwrap()
});

// ── Read / delete metrics ────────────────────────────────────────────────────

pub static QUERY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("spanstat_query_total", "Total Query calls", &["status"]).unwrap()
});

pub static DELETED_ROWS: Lazy<Counter> = Lazy::new(|| {
    register_counter!("spanstat_deleted_rows_total", "Stored rows deleted").unwrap()
});

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
