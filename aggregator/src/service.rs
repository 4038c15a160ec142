//! Collector: the ingestion, query and delete entry points over one
//! write-back buffer and one store.

use crate::buffer::WriteBackBuffer;
use crate::config::AggregatorConfig;
use crate::delete::delete_events;
use crate::error::Result;
use crate::flush::{FlushExecutor, FlushTrigger};
use crate::metrics;
use crate::query::query;
use crate::retry::RetryPolicy;
use crate::storage::EventStore;
use spanstat_shared::{Entry, Event, Filter};
use std::sync::Arc;
use std::time::Duration;

pub struct Collector {
    buffer: Arc<WriteBackBuffer>,
    store: Arc<dyn EventStore>,
}

impl Collector {
    pub fn new(
        store: Arc<dyn EventStore>,
        capacity: usize,
        flush_interval: Duration,
        record_ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let executor = FlushExecutor::new(store.clone(), record_ttl);
        let buffer = WriteBackBuffer::new(executor, capacity, flush_interval).with_retry_policy(retry);
        Self {
            buffer: Arc::new(buffer),
            store,
        }
    }

    pub fn from_config(store: Arc<dyn EventStore>, config: &AggregatorConfig) -> Self {
        Self::new(
            store,
            config.flush.buffer_size,
            config.flush.interval,
            config.record_ttl,
            config.retry.clone(),
        )
    }

    pub fn buffer(&self) -> &Arc<WriteBackBuffer> {
        &self.buffer
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Feed each entry to the buffer in order, stopping at the first error.
    pub async fn insert_events(&self, entries: &[Entry]) -> Result<()> {
        for entry in entries {
            if let Err(e) = self.buffer.write(entry).await {
                metrics::INSERT_TOTAL.with_label_values(&["error"]).inc();
                return Err(e);
            }
        }
        metrics::INSERT_TOTAL.with_label_values(&["ok"]).inc();
        Ok(())
    }

    /// Aggregated view of flushed events. Buffered events are not included.
    pub async fn query(&self, filter: &Filter) -> Result<Vec<Event>> {
        let result = query(self.store.as_ref(), filter).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::QUERY_TOTAL.with_label_values(&[status]).inc();
        result
    }

    pub async fn delete_events(&self, filter: &Filter) -> Result<u64> {
        let deleted = delete_events(self.store.as_ref(), filter).await?;
        metrics::DELETED_ROWS.inc_by(deleted as f64);
        crate::audit::events_deleted(filter, deleted);
        Ok(deleted)
    }

    /// Flush the buffer now, regardless of size or interval.
    pub async fn flush(&self) -> Result<usize> {
        self.buffer.flush(FlushTrigger::Manual).await
    }
}
