//! Storage backends
//!
//! The aggregation core talks to durable storage only through [`EventStore`].
//! Rows are written in unlogged batches: a backend may apply a subset of a
//! batch if it fails part way, and callers must not assume atomicity.

#[cfg(feature = "clickhouse-storage")]
pub mod clickhouse;
pub mod memory;

use crate::error::Result;
use crate::filter::Predicate;
use async_trait::async_trait;
use uuid::Uuid;

/// One durable row written by a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: Uuid,
    pub trace_id: String,
    pub origin: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
    /// Milliseconds since Unix epoch.
    pub created_at_ms: i64,
    /// Milliseconds since Unix epoch after which the backend may drop the row.
    pub expires_at_ms: i64,
}

/// Columns returned by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRow {
    pub id: Uuid,
    pub trace_id: String,
    pub origin: String,
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl From<&StoredRecord> for ScannedRow {
    fn from(r: &StoredRecord) -> Self {
        Self {
            id: r.id,
            trace_id: r.trace_id.clone(),
            origin: r.origin.clone(),
            name: r.name.clone(),
            value: r.value,
            unit: r.unit.clone(),
        }
    }
}

/// Durable event store.
///
/// Implementations:
/// - `InMemoryStore`: process-local rows, expiry enforced on scan
/// - `ClickHouseStore`: MergeTree table with row TTL (`clickhouse-storage` feature)
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Short backend name for logs and readiness output.
    fn name(&self) -> &'static str;

    /// Mint a globally unique identifier for a new row.
    fn new_row_id(&self) -> Result<Uuid> {
        Ok(Uuid::new_v4())
    }

    /// Submit all records as one request. Not a transaction.
    ///
    /// Rows are identified by `id`: resubmitting a record that is already
    /// stored must leave a single copy, so retried batches do not inflate sums.
    async fn write_unlogged_batch(&self, records: &[StoredRecord]) -> Result<()>;

    /// All live rows matching the predicate, in backend order.
    async fn scan(&self, predicate: &Predicate) -> Result<Vec<ScannedRow>>;

    /// Delete a single row by id. Deleting a missing row is not an error.
    async fn delete_row(&self, id: Uuid) -> Result<()>;

    /// Cheap reachability probe for readiness checks.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
