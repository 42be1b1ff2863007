//! Error types for the entitlement store and reconciler.

use subgate_types::Environment;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage engine is unavailable or returned corrupt
    /// data.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Reconciliation failures.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The event's environment does not match the stored record's.
    #[error("event environment {event} does not match record environment {record}")]
    EnvironmentMismatch {
        event: Environment,
        record: Environment,
    },

    /// The conditional write lost every retry round.
    #[error("conditional write conflicted on every retry")]
    Conflict,

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
