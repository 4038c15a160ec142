//! Flush executor: turns buffered aggregates into one unlogged batch write.

use crate::error::Result;
use crate::key::AggregateMap;
use crate::metrics;
use crate::storage::{EventStore, StoredRecord};
use spanstat_shared::utils::time::{expiry_millis, now_millis};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What caused a flush. Used for metrics labels and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Buffer grew past its capacity during a write.
    Size,
    /// A write arrived after the flush interval elapsed.
    Interval,
    /// Background ticker found the interval elapsed.
    Ticker,
    /// Explicit request (shutdown, admin, tests).
    Manual,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushTrigger::Size => "size",
            FlushTrigger::Interval => "interval",
            FlushTrigger::Ticker => "ticker",
            FlushTrigger::Manual => "manual",
        }
    }
}

/// Writes one record per aggregation key, each with a fresh id and a finite
/// expiry. The batch goes out as a single request and is not atomic: the
/// store may keep part of it if the request fails.
pub struct FlushExecutor {
    store: Arc<dyn EventStore>,
    ttl: Duration,
}

impl FlushExecutor {
    pub fn new(store: Arc<dyn EventStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build the insert operations for `aggregates`.
    ///
    /// Fails with `IdentifierGenerationFailed` if the store cannot mint an id.
    pub fn build_batch(&self, aggregates: &AggregateMap) -> Result<Vec<StoredRecord>> {
        let created_at_ms = now_millis();
        let expires_at_ms = expiry_millis(created_at_ms, self.ttl);
        aggregates
            .iter()
            .map(|(key, value)| {
                Ok(StoredRecord {
                    id: self.store.new_row_id()?,
                    trace_id: key.trace_id.clone(),
                    origin: key.origin.clone(),
                    name: key.name.clone(),
                    value,
                    unit: key.unit.clone(),
                    created_at_ms,
                    expires_at_ms,
                })
            })
            .collect()
    }

    /// Submit a prepared batch. Retries pass the same records, and stores
    /// keep one row per id, so a batch that was applied before its failure
    /// was reported is not counted twice.
    pub async fn write(&self, records: &[StoredRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        self.store.write_unlogged_batch(records).await?;
        metrics::FLUSH_ROWS.inc_by(records.len() as f64);
        metrics::FLUSH_DURATION.observe(start.elapsed().as_secs_f64());
        tracing::debug!(
            "Batch wrote {} records to {} store",
            records.len(),
            self.store.name()
        );
        Ok(())
    }
}
