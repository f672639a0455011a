use std::time::Duration;

use thiserror::Error;

/// Classified failure reported by an [`AccountStore`](crate::store::AccountStore).
///
/// The store decides the class; retry logic only ever looks at the variant,
/// never at the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused to commit because of a concurrent transaction.
    #[error("Serialization conflict: {0}")]
    Conflict(String),

    /// Any other store failure, e.g. a missing account or a lost connection.
    #[error("Store failure: {0}")]
    Other(String),
}

impl StoreError {
    /// Returns `true` when the failure is a serialization conflict and may be retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Invalid chunk size {0}: chunk size must be positive")]
    InvalidChunkSize(usize),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Could not reset store to baseline before k={k}: {reason}")]
    Reset { k: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{pending} of {total} workers still running after {waited:?}")]
    Timeout {
        pending: usize,
        total: usize,
        waited: Duration,
    },

    #[error("Scenario not run: {0}")]
    Abandoned(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
