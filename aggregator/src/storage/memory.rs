//! In-memory event store
//!
//! Used when no external backend is configured, and by tests. Rows past their
//! expiry are invisible to scans and are dropped on the next write. Writing a
//! record whose id is already stored replaces the stored row.

use super::{EventStore, ScannedRow, StoredRecord};
use crate::error::{AggregatorError, Result};
use crate::filter::Predicate;
use async_trait::async_trait;
use spanstat_shared::utils::time::now_millis;
use std::collections::HashSet;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: RwLock<Vec<StoredRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, expired ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Copy of every stored row.
    pub fn records(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<StoredRecord>>> {
        self.rows
            .read()
            .map_err(|e| AggregatorError::StoreUnavailable(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<StoredRecord>>> {
        self.rows
            .write()
            .map_err(|e| AggregatorError::StoreWriteFailed(e.to_string()))
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn write_unlogged_batch(&self, records: &[StoredRecord]) -> Result<()> {
        let now = now_millis();
        let incoming: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
        let mut rows = self.write()?;
        // Rows are keyed by id: a resubmitted record replaces its earlier copy.
        rows.retain(|r| r.expires_at_ms > now && !incoming.contains(&r.id));
        rows.extend_from_slice(records);
        Ok(())
    }

    async fn scan(&self, predicate: &Predicate) -> Result<Vec<ScannedRow>> {
        let now = now_millis();
        let rows = self.read()?;
        Ok(rows
            .iter()
            .filter(|r| r.expires_at_ms > now)
            .filter(|r| predicate.matches(&r.trace_id, &r.origin, &r.name))
            .map(ScannedRow::from)
            .collect())
    }

    async fn delete_row(&self, id: Uuid) -> Result<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| AggregatorError::StoreUnavailable(e.to_string()))?;
        rows.retain(|r| r.id != id);
        Ok(())
    }
}
