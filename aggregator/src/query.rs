//! Query aggregator
//!
//! Re-aggregates stored rows with the same key and merge rule the write path
//! uses. Many rows can exist per key (one per flush), so summing them here is
//! what recovers the true total.

use crate::error::Result;
use crate::filter::to_predicate;
use crate::key::{AggregateMap, AggregationKey};
use crate::storage::EventStore;
use spanstat_shared::{Event, Filter};

/// Sum all stored rows matching `filter`, sorted by name then unit.
///
/// Trace and origin come from the filter rather than from each row, so rows
/// that share a name and unit fold into one result even when the filter
/// leaves trace or origin open. Any translation or scan error fails the whole
/// query.
pub async fn query(store: &dyn EventStore, filter: &Filter) -> Result<Vec<Event>> {
    let predicate = to_predicate(filter)?;
    let rows = store.scan(&predicate).await?;

    let origin = filter.origin.as_deref().unwrap_or_default();
    let trace_id = filter.trace_id.as_deref().unwrap_or_default();

    let mut aggregates = AggregateMap::new();
    for row in rows {
        aggregates.merge(
            AggregationKey::new(origin, trace_id, row.name, row.unit),
            row.value,
        );
    }
    Ok(aggregates.into_sorted_events())
}
