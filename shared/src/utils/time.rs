//! Time-related utilities

use chrono::Utc;
use std::time::Duration;

/// Current wall-clock time in milliseconds since UNIX epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry (ms since epoch) for a record created at `created_at_ms`
/// that lives for `ttl`.
pub fn expiry_millis(created_at_ms: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    created_at_ms.saturating_add(ttl_ms)
}
