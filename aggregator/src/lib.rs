//! Aggregator service library
//!
//! Buffers incoming trace events, writes them to durable storage as
//! per-key aggregates, and answers queries by re-aggregating stored rows.

pub mod audit;
pub mod buffer;
pub mod config;
pub mod delete;
pub mod error;
pub mod filter;
pub mod flush;
pub mod key;
pub mod metrics;
pub mod query;
pub mod retry;
pub mod server;
pub mod service;
pub mod storage;

pub use error::{AggregatorError, Result};
pub use service::Collector;
