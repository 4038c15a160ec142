//! Write-back buffer for ingested events
//!
//! Incoming events are summed per [`AggregationKey`] in memory and written to
//! the store as one row per key when the buffer grows past its capacity or
//! the flush interval has elapsed. Merging and the flush decision (including
//! the store call itself) happen under one async mutex, so a flush never runs
//! concurrently with a buffer mutation and two writers can never both flush
//! the same generation of data.
//!
//! Events only become visible to queries once the flush carrying them has
//! been written.

use crate::error::{AggregatorError, Result};
use crate::flush::{FlushExecutor, FlushTrigger};
use crate::key::{AggregateMap, AggregationKey};
use crate::metrics;
use crate::retry::{retry_with_backoff_if, OnExhausted, RetryPolicy};
use spanstat_shared::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest period for the background flush ticker.
const MIN_TICK: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct BufferState {
    aggregates: AggregateMap,
    last_export: Instant,
}

pub struct WriteBackBuffer {
    capacity: usize,
    flush_interval: Duration,
    retry: RetryPolicy,
    executor: FlushExecutor,
    state: Mutex<BufferState>,
}

impl WriteBackBuffer {
    /// Create a buffer that flushes once it holds more than `capacity` keys
    /// or `flush_interval` has passed since the last flush.
    pub fn new(executor: FlushExecutor, capacity: usize, flush_interval: Duration) -> Self {
        Self {
            capacity,
            flush_interval,
            retry: RetryPolicy::default(),
            executor,
            state: Mutex::new(BufferState {
                aggregates: AggregateMap::with_capacity(capacity.min(4096)),
                last_export: Instant::now(),
            }),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Merge every event of `entry`, then flush if a trigger fires.
    ///
    /// A failed flush is returned to the caller. What happens to the
    /// aggregates of that flush is decided by the retry policy.
    pub async fn write(&self, entry: &Entry) -> Result<()> {
        let mut state = self.state.lock().await;
        state.aggregates.merge_entry(entry);
        metrics::EVENTS_INGESTED.inc_by(entry.events.len() as f64);
        metrics::BUFFER_KEYS.set(state.aggregates.len() as f64);

        let trigger = if state.aggregates.len() > self.capacity {
            Some(FlushTrigger::Size)
        } else if state.last_export.elapsed() >= self.flush_interval {
            Some(FlushTrigger::Interval)
        } else {
            None
        };

        if let Some(trigger) = trigger {
            self.flush_locked(&mut state, trigger).await?;
        }
        Ok(())
    }

    /// Flush unconditionally. Returns the number of rows written.
    pub async fn flush(&self, trigger: FlushTrigger) -> Result<usize> {
        let mut state = self.state.lock().await;
        self.flush_locked(&mut state, trigger).await
    }

    /// Flush only if the interval has elapsed since the last flush, so a
    /// recent size-triggered flush absorbs the timed one.
    pub async fn flush_if_due(&self) -> Result<Option<usize>> {
        let mut state = self.state.lock().await;
        if state.last_export.elapsed() < self.flush_interval {
            return Ok(None);
        }
        self.flush_locked(&mut state, FlushTrigger::Ticker)
            .await
            .map(Some)
    }

    async fn flush_locked(&self, state: &mut BufferState, trigger: FlushTrigger) -> Result<usize> {
        let aggregates = std::mem::take(&mut state.aggregates);
        metrics::BUFFER_KEYS.set(0.0);

        if aggregates.is_empty() {
            state.last_export = Instant::now();
            return Ok(0);
        }

        let count = aggregates.len();
        info!("Batch writing {} records ({})", count, trigger.as_str());

        let outcome = match self.executor.build_batch(&aggregates) {
            Ok(records) => {
                retry_with_backoff_if(
                    "Batch write",
                    &self.retry,
                    AggregatorError::is_transient,
                    || self.executor.write(&records),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                state.last_export = Instant::now();
                metrics::FLUSH_TOTAL
                    .with_label_values(&[trigger.as_str(), "ok"])
                    .inc();
                Ok(count)
            }
            Err(e) => {
                metrics::FLUSH_TOTAL
                    .with_label_values(&[trigger.as_str(), "error"])
                    .inc();
                match self.retry.on_exhausted {
                    OnExhausted::Discard => {
                        warn!("Flush of {} aggregates failed, discarding: {}", count, e);
                        metrics::FLUSH_DISCARDED.inc_by(count as f64);
                    }
                    OnExhausted::Requeue => {
                        warn!("Flush of {} aggregates failed, re-queuing: {}", count, e);
                        state.aggregates.absorb(aggregates);
                        metrics::BUFFER_KEYS.set(state.aggregates.len() as f64);
                    }
                }
                Err(e)
            }
        }
    }

    /// Distinct keys currently buffered.
    pub async fn len(&self) -> usize {
        self.state.lock().await.aggregates.len()
    }

    /// Distinct keys buffered, or `None` while a write or flush holds the
    /// buffer. Never waits.
    pub fn try_len(&self) -> Option<usize> {
        self.state.try_lock().ok().map(|state| state.aggregates.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Buffered running sum for one key, if any.
    pub async fn buffered_value(&self, key: &AggregationKey) -> Option<f64> {
        self.state.lock().await.aggregates.get(key)
    }

    /// Time of the last successful flush (or of construction).
    pub async fn last_export(&self) -> Instant {
        self.state.lock().await.last_export
    }

    /// Spawn a background task that flushes whenever the interval has elapsed,
    /// independent of incoming writes. On cancel (shutdown), performs one final flush.
    pub fn spawn_ticker(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let buffer = Arc::clone(self);
        let period = (self.flush_interval / 2).max(MIN_TICK);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match buffer.flush_if_due().await {
                            Ok(Some(rows)) if rows > 0 => debug!("Timer flush: {} rows", rows),
                            Ok(_) => {}
                            Err(e) => warn!("Timer flush failed: {}", e),
                        }
                    }
                    _ = cancel.cancelled() => {
                        match buffer.flush(FlushTrigger::Manual).await {
                            Ok(rows) => info!("Shutdown flush: {} rows", rows),
                            Err(e) => warn!("Shutdown flush failed: {}", e),
                        }
                        break;
                    }
                }
            }
        })
    }
}
