//! Collector behavior end to end against in-process stores.

use async_trait::async_trait;
use spanstat_aggregator::filter::Predicate;
use spanstat_aggregator::retry::RetryPolicy;
use spanstat_aggregator::storage::memory::InMemoryStore;
use spanstat_aggregator::storage::{EventStore, ScannedRow, StoredRecord};
use spanstat_aggregator::{AggregatorError, Collector, Result};
use spanstat_shared::{Entry, Event, Filter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// In-memory store that counts batch writes and can fail the next N of them.
#[derive(Default)]
struct CountingStore {
    inner: InMemoryStore,
    batches: AtomicU32,
    fail_writes: AtomicU32,
}

impl CountingStore {
    fn batches(&self) -> u32 {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn write_unlogged_batch(&self, records: &[StoredRecord]) -> Result<()> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AggregatorError::StoreWriteFailed("backend down".into()));
        }
        self.inner.write_unlogged_batch(records).await
    }

    async fn scan(&self, predicate: &Predicate) -> Result<Vec<ScannedRow>> {
        self.inner.scan(predicate).await
    }

    async fn delete_row(&self, id: Uuid) -> Result<()> {
        self.inner.delete_row(id).await
    }
}

fn collector(store: Arc<CountingStore>, capacity: usize, interval: Duration) -> Collector {
    Collector::new(
        store,
        capacity,
        interval,
        Duration::from_secs(3600),
        RetryPolicy::default(),
    )
}

fn ev(name: &str, value: f64, unit: &str) -> Event {
    Event::new(name, value, unit)
}

fn ot() -> Filter {
    Filter::new().origin("o").trace_id("t")
}

#[tokio::test]
async fn query_after_flush_returns_summed_event() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store, 100, Duration::from_secs(60));

    c.insert_events(&[Entry::new(
        "o",
        "t",
        vec![ev("cpu", 1.0, "pct"), ev("cpu", 2.0, "pct")],
    )])
    .await
    .unwrap();
    c.flush().await.unwrap();

    assert_eq!(c.query(&ot()).await.unwrap(), vec![ev("cpu", 3.0, "pct")]);
}

#[tokio::test]
async fn unflushed_events_are_not_visible() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store, 100, Duration::from_secs(60));

    c.insert_events(&[Entry::new("o", "t", vec![ev("cpu", 1.0, "pct")])])
        .await
        .unwrap();
    assert!(c.query(&ot()).await.unwrap().is_empty());

    c.flush().await.unwrap();
    assert_eq!(c.query(&ot()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn totals_match_across_many_flushes() {
    let store = Arc::new(CountingStore::default());
    // Capacity 1: almost every write with a new key flushes.
    let c = collector(store.clone(), 1, Duration::from_secs(60));

    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    for (i, v) in values.iter().enumerate() {
        let name = if i % 2 == 0 { "cpu" } else { "mem" };
        c.insert_events(&[Entry::new("o", "t", vec![ev(name, *v, "u")])])
            .await
            .unwrap();
    }
    c.flush().await.unwrap();
    assert!(store.batches() > 1);

    assert_eq!(
        c.query(&ot()).await.unwrap(),
        vec![ev("cpu", 9.0, "u"), ev("mem", 12.0, "u")]
    );
}

#[tokio::test]
async fn order_and_grouping_do_not_change_totals() {
    let events = vec![
        ev("cpu", 1.0, "pct"),
        ev("cpu", 10.0, "pct"),
        ev("cpu", 100.0, "pct"),
    ];

    let one = Arc::new(CountingStore::default());
    let c1 = collector(one, 100, Duration::from_secs(60));
    c1.insert_events(&[Entry::new("o", "t", events.clone())])
        .await
        .unwrap();
    c1.flush().await.unwrap();

    let many = Arc::new(CountingStore::default());
    let c2 = collector(many, 100, Duration::from_secs(60));
    for e in events.iter().rev() {
        c2.insert_events(&[Entry::new("o", "t", vec![e.clone()])])
            .await
            .unwrap();
        c2.flush().await.unwrap();
    }

    let expected = vec![ev("cpu", 111.0, "pct")];
    assert_eq!(c1.query(&ot()).await.unwrap(), expected);
    assert_eq!(c2.query(&ot()).await.unwrap(), expected);
}

#[tokio::test]
async fn results_are_sorted_by_name() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store, 100, Duration::from_secs(60));

    c.insert_events(&[Entry::new(
        "o",
        "t",
        vec![ev("zz", 1.0, "u"), ev("aa", 1.0, "u"), ev("mm", 1.0, "u")],
    )])
    .await
    .unwrap();
    c.flush().await.unwrap();

    let names: Vec<String> = c
        .query(&ot())
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["aa", "mm", "zz"]);
}

#[tokio::test]
async fn capacity_two_flushes_on_third_key() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store.clone(), 2, Duration::from_secs(60));

    for name in ["a", "b"] {
        c.insert_events(&[Entry::new("o", "t", vec![ev(name, 1.0, "u")])])
            .await
            .unwrap();
    }
    assert_eq!(store.batches(), 0);

    c.insert_events(&[Entry::new("o", "t", vec![ev("c", 1.0, "u")])])
        .await
        .unwrap();
    assert_eq!(store.batches(), 1);
    assert!(c.buffer().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn write_after_interval_flushes() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store.clone(), 100, Duration::from_millis(100));

    c.insert_events(&[Entry::new("o", "t", vec![ev("a", 1.0, "u")])])
        .await
        .unwrap();
    assert_eq!(store.batches(), 0);

    tokio::time::advance(Duration::from_millis(100)).await;
    c.insert_events(&[Entry::new("o", "t", vec![ev("a", 1.0, "u")])])
        .await
        .unwrap();
    assert_eq!(store.batches(), 1);
    assert_eq!(c.query(&ot()).await.unwrap(), vec![ev("a", 2.0, "u")]);
}

#[tokio::test]
async fn failed_flush_surfaces_error_and_next_cycle_succeeds() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store.clone(), 1, Duration::from_secs(60));

    c.insert_events(&[Entry::new("o", "t", vec![ev("lost", 1.0, "u")])])
        .await
        .unwrap();
    store.fail_writes.store(1, Ordering::SeqCst);
    let err = c
        .insert_events(&[Entry::new("o", "t", vec![ev("lost", 1.0, "u"), ev("x", 1.0, "u")])])
        .await
        .unwrap_err();
    assert!(matches!(err, AggregatorError::StoreWriteFailed(_)));

    c.insert_events(&[Entry::new("o", "t", vec![ev("kept", 2.0, "u"), ev("y", 3.0, "u")])])
        .await
        .unwrap();

    assert_eq!(
        c.query(&ot()).await.unwrap(),
        vec![ev("kept", 2.0, "u"), ev("y", 3.0, "u")]
    );
}

#[tokio::test]
async fn requeue_policy_keeps_failed_aggregates() {
    let store = Arc::new(CountingStore::default());
    let c = Collector::new(
        store.clone(),
        100,
        Duration::from_secs(60),
        Duration::from_secs(3600),
        RetryPolicy::default().requeue(),
    );

    c.insert_events(&[Entry::new("o", "t", vec![ev("cpu", 4.0, "pct")])])
        .await
        .unwrap();
    store.fail_writes.store(1, Ordering::SeqCst);
    assert!(c.flush().await.is_err());
    assert_eq!(c.buffer().len().await, 1);

    c.flush().await.unwrap();
    assert_eq!(c.query(&ot()).await.unwrap(), vec![ev("cpu", 4.0, "pct")]);
}

#[tokio::test]
async fn delete_removes_matching_rows() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store, 100, Duration::from_secs(60));

    c.insert_events(&[
        Entry::new("o", "t", vec![ev("cpu", 1.0, "pct")]),
        Entry::new("o", "other", vec![ev("cpu", 5.0, "pct")]),
    ])
    .await
    .unwrap();
    c.flush().await.unwrap();

    assert_eq!(c.delete_events(&ot()).await.unwrap(), 1);
    assert!(c.query(&ot()).await.unwrap().is_empty());
    assert_eq!(
        c.query(&Filter::new().trace_id("other")).await.unwrap(),
        vec![ev("cpu", 5.0, "pct")]
    );
}

#[tokio::test]
async fn invalid_filter_rejected_for_query_and_delete() {
    let store = Arc::new(CountingStore::default());
    let c = collector(store, 100, Duration::from_secs(60));

    let bad = Filter::new().trace_id(" ");
    assert!(matches!(
        c.query(&bad).await,
        Err(AggregatorError::InvalidFilter(_))
    ));
    assert!(matches!(
        c.delete_events(&bad).await,
        Err(AggregatorError::InvalidFilter(_))
    ));
}
