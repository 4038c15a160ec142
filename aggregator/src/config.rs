//! Aggregator configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `SPANSTAT_*` environment variables (`__` separates nested keys,
//! e.g. `SPANSTAT_FLUSH__BUFFER_SIZE=5000`).

use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "SPANSTAT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Listen address for gRPC server
    pub listen_addr: String,

    /// Admin HTTP listen address (health checks + metrics)
    pub admin_addr: String,

    /// Max gRPC message size in bytes
    pub max_message_size: usize,

    /// Optional bearer token for gRPC authentication
    pub auth_token: Option<String>,

    /// Time-to-live applied to every stored record
    #[serde(with = "duration_str")]
    pub record_ttl: Duration,

    /// Write-back buffer sizing and flush cadence
    pub flush: FlushConfig,

    /// Behavior when a flush's batch write fails
    pub retry: RetryPolicy,

    /// Storage backend configuration
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    /// Flush once the buffer holds more than this many distinct keys
    pub buffer_size: usize,

    /// Flush when this much time has passed since the last flush
    #[serde(with = "duration_str")]
    pub interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    #[serde(rename = "clickhouse")]
    ClickHouse {
        endpoint: String,
        /// Database (keyspace) holding the events table
        database: String,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    InMemory,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50051".to_string(),
            admin_addr: "0.0.0.0:9090".to_string(),
            max_message_size: 16 * 1024 * 1024,
            auth_token: None,
            record_ttl: Duration::from_secs(7 * 86_400),
            flush: FlushConfig::default(),
            retry: RetryPolicy::default(),
            storage: StorageConfig::InMemory,
        }
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1_000,
            interval: Duration::from_secs(10),
        }
    }
}

impl AggregatorConfig {
    /// Load defaults, then `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&AggregatorConfig::default())
            .context("Serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AggregatorConfig = builder
            .build()
            .context("Read configuration")?
            .try_deserialize()
            .context("Parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.flush.buffer_size == 0 {
            anyhow::bail!("flush.buffer_size must be greater than 0");
        }
        if self.flush.interval.is_zero() {
            anyhow::bail!("flush.interval must be greater than 0");
        }
        if self.record_ttl.as_secs() == 0 {
            anyhow::bail!("record_ttl must be at least one second");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if let StorageConfig::ClickHouse {
            endpoint, database, ..
        } = &self.storage
        {
            if endpoint.is_empty() || database.is_empty() {
                anyhow::bail!("clickhouse storage needs both endpoint and database");
            }
        }
        Ok(())
    }
}

/// Serde adapter for durations written as `"250ms"`, `"10s"`, `"7d"`.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use spanstat_shared::utils::{format_duration, parse_duration};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
