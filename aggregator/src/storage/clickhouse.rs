//! ClickHouse storage backend
//!
//! One row per flushed aggregate in a ReplacingMergeTree table whose sorting
//! key ends in `id`, so a batch resubmitted after an ambiguous failure collapses
//! to one copy per row. Scans read with `FINAL` because replacement happens
//! during background merges. Expiry is handled by the table TTL; scans also
//! skip rows past `expires_at_ms` because TTL merges run lazily.

use super::{EventStore, ScannedRow, StoredRecord};
use crate::error::{AggregatorError, Result};
use crate::filter::Predicate;
use anyhow::Context;
use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};
use spanstat_shared::utils::time::now_millis;
use uuid::Uuid;

const TABLE_NAME: &str = "events";

const DEFAULT_TABLE_ENGINE: &str = "\
ReplacingMergeTree() \
PARTITION BY toYYYYMM(fromUnixTimestamp64Milli(created_at_ms)) \
ORDER BY (trace_id, origin, event, id) \
TTL toDateTime(fromUnixTimestamp64Milli(expires_at_ms)) \
SETTINGS index_granularity = 8192";

/// One row in the events table (matches ClickHouse schema).
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub trace_id: String,
    pub origin: String,
    pub event: String,
    pub value: f64,
    pub unit: String,
    /// Milliseconds since Unix epoch.
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

impl From<&StoredRecord> for EventRow {
    fn from(r: &StoredRecord) -> Self {
        Self {
            id: r.id.to_string(),
            trace_id: r.trace_id.clone(),
            origin: r.origin.clone(),
            event: r.name.clone(),
            value: r.value,
            unit: r.unit.clone(),
            created_at_ms: r.created_at_ms,
            expires_at_ms: r.expires_at_ms,
        }
    }
}

/// ClickHouse-backed event store.
pub struct ClickHouseStore {
    client: Client,
    table: String,
}

impl ClickHouseStore {
    /// Connect, create the database and events table if missing.
    pub async fn new(
        endpoint: &str,
        database: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut client = Client::default()
            .with_url(endpoint)
            .with_option("connect_timeout", "10")
            .with_option("receive_timeout", "30");
        if let Some(user) = user {
            client = client.with_user(user);
        }
        if let Some(password) = password {
            client = client.with_password(password);
        }

        client
            .query(&format!("CREATE DATABASE IF NOT EXISTS {}", database))
            .execute()
            .await
            .context("Create ClickHouse database")?;

        let store = Self {
            client: client.with_database(database),
            table: TABLE_NAME.to_string(),
        };
        store.ensure_table().await?;
        Ok(store)
    }

    async fn ensure_table(&self) -> anyhow::Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id String,
                trace_id String,
                origin String,
                event String,
                value Float64,
                unit String,
                created_at_ms Int64,
                expires_at_ms Int64
            ) ENGINE = {}",
            self.table, DEFAULT_TABLE_ENGINE
        );
        self.client
            .query(&ddl)
            .execute()
            .await
            .context("Create ClickHouse table")?;
        Ok(())
    }

    async fn insert_rows(&self, records: &[StoredRecord]) -> clickhouse::error::Result<()> {
        let mut insert = self.client.insert(&self.table)?;
        for record in records {
            insert.write(&EventRow::from(record)).await?;
        }
        insert.end().await
    }
}

/// Live-row scan. `FINAL` folds rows that share an id but have not been
/// merged yet.
fn scan_sql(table: &str, where_clause: &str) -> String {
    let live = if where_clause.is_empty() {
        "WHERE expires_at_ms > ?".to_string()
    } else {
        format!("{} AND expires_at_ms > ?", where_clause)
    };
    format!("SELECT ?fields FROM {} FINAL {}", table, live)
}

fn unavailable(e: impl std::fmt::Display) -> AggregatorError {
    AggregatorError::StoreUnavailable(e.to_string())
}

#[async_trait]
impl EventStore for ClickHouseStore {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    async fn write_unlogged_batch(&self, records: &[StoredRecord]) -> Result<()> {
        self.insert_rows(records)
            .await
            .map_err(|e| AggregatorError::StoreWriteFailed(e.to_string()))
    }

    async fn scan(&self, predicate: &Predicate) -> Result<Vec<ScannedRow>> {
        let (where_clause, binds) = predicate.to_sql();
        let sql = scan_sql(&self.table, &where_clause);

        let mut q = self.client.query(&sql);
        for value in binds {
            q = q.bind(value);
        }
        q = q.bind(now_millis());

        let mut cursor = q.fetch::<EventRow>().map_err(unavailable)?;
        let mut out = Vec::new();
        while let Some(row) = cursor.next().await.map_err(unavailable)? {
            out.push(ScannedRow {
                id: Uuid::parse_str(&row.id).map_err(unavailable)?,
                trace_id: row.trace_id,
                origin: row.origin,
                name: row.event,
                value: row.value,
                unit: row.unit,
            });
        }
        Ok(out)
    }

    async fn delete_row(&self, id: Uuid) -> Result<()> {
        self.client
            .query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(id.to_string())
            .execute()
            .await
            .map_err(unavailable)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(unavailable)
    }
}
