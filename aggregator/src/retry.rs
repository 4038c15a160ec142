//! Flush retry policy with exponential backoff

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Upper bound for a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// What to do with aggregates whose flush failed on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnExhausted {
    /// Drop them and report the error.
    Discard,
    /// Merge them back into the buffer so the next flush carries them.
    Requeue,
}

/// How the write-back buffer reacts to a failed batch write.
///
/// The default makes a single attempt and discards on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per flush, including the first. Must be at least one;
    /// configuration loading rejects zero.
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles after each failure.
    #[serde(with = "crate::config::duration_str")]
    pub initial_delay: Duration,

    pub on_exhausted: OnExhausted,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(100),
            on_exhausted: OnExhausted::Discard,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn requeue(mut self) -> Self {
        self.on_exhausted = OnExhausted::Requeue;
        self
    }
}

/// Retry an async operation with exponential backoff.
///
/// Returns `Ok` on first success, or the last `Err` after all attempts are exhausted.
/// Delays: `initial_delay`, `2 * initial_delay`, `4 * initial_delay`, ... capped at 30s.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff_if(operation_name, policy, |_| true, f).await
}

/// Like [`retry_with_backoff`], but gives up at once on errors for which
/// `retryable` returns false.
///
/// A policy built in code with `max_attempts == 0` still runs once.
pub async fn retry_with_backoff_if<F, Fut, T, E, R>(
    operation_name: &str,
    policy: &RetryPolicy,
    retryable: R,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if attempt >= max_attempts || !retryable(&e) => return Err(e),
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_attempts, e
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                attempt += 1;
            }
        }
    }
}
