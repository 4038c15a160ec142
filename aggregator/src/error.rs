//! Error taxonomy for the aggregation core

use thiserror::Error;

pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AggregatorError {
    /// The filter references unsupported or conflicting values.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Backend could not be reached, or a scan/delete failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A batch write was rejected or failed part way.
    #[error("store write failed: {0}")]
    StoreWriteFailed(String),

    /// Minting a row identifier failed; the flush attempt was aborted.
    #[error("identifier generation failed: {0}")]
    IdentifierGenerationFailed(String),
}

impl AggregatorError {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AggregatorError::StoreUnavailable(_)
                | AggregatorError::StoreWriteFailed(_)
                | AggregatorError::IdentifierGenerationFailed(_)
        )
    }
}
