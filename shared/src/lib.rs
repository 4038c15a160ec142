//! Shared types and utilities for spanstat
//!
//! This crate contains the event data model and small helpers used by both the
//! aggregator service and the command-line client.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::events::*;
