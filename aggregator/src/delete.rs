//! Delete path: scan matching rows and remove them one at a time.

use crate::error::{AggregatorError, Result};
use crate::filter::to_predicate;
use crate::storage::EventStore;
use spanstat_shared::Filter;

/// Delete every stored row matching `filter`. Returns the number of rows
/// deleted.
///
/// An empty filter is rejected rather than wiping the whole table. Rows are
/// deleted individually; a failure stops the loop and leaves earlier
/// deletions in place.
pub async fn delete_events(store: &dyn EventStore, filter: &Filter) -> Result<u64> {
    let predicate = to_predicate(filter)?;
    if predicate.is_empty() {
        return Err(AggregatorError::InvalidFilter(
            "delete requires at least one of trace_id, origin, event".to_string(),
        ));
    }

    let rows = store.scan(&predicate).await?;
    let mut deleted = 0u64;
    for row in rows {
        tracing::debug!("Deleting {}", row.id);
        store.delete_row(row.id).await?;
        deleted += 1;
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Predicate;
    use crate::storage::memory::InMemoryStore;
    use crate::storage::StoredRecord;
    use spanstat_shared::utils::time::now_millis;
    use uuid::Uuid;

    fn record(trace_id: &str, name: &str) -> StoredRecord {
        StoredRecord {
            id: Uuid::new_v4(),
            trace_id: trace_id.to_string(),
            origin: "o".to_string(),
            name: name.to_string(),
            value: 1.0,
            unit: "ms".to_string(),
            created_at_ms: now_millis(),
            expires_at_ms: now_millis() + 60_000,
        }
    }

    #[tokio::test]
    async fn test_deletes_only_matching_rows() {
        let store = InMemoryStore::new();
        store
            .write_unlogged_batch(&[record("t1", "cpu"), record("t1", "mem"), record("t2", "cpu")])
            .await
            .unwrap();

        let deleted = delete_events(&store, &Filter::new().trace_id("t1")).await.unwrap();
        assert_eq!(deleted, 2);

        let left = store.scan(&Predicate::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].trace_id, "t2");
    }

    #[tokio::test]
    async fn test_nothing_matches() {
        let store = InMemoryStore::new();
        let deleted = delete_events(&store, &Filter::new().origin("nobody")).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn test_empty_filter_rejected() {
        let store = InMemoryStore::new();
        store.write_unlogged_batch(&[record("t", "cpu")]).await.unwrap();

        let err = delete_events(&store, &Filter::default()).await.unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidFilter(_)));
        assert_eq!(store.len().unwrap(), 1);
    }
}
