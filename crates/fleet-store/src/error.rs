//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row lock could not be taken or a uniqueness constraint was violated
    /// by a concurrent transaction. The unit of work may be retried.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if the failed unit of work can be recomputed and retried.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        use rocksdb::ErrorKind;

        match e.kind() {
            ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain => {
                Self::Conflict(e.to_string())
            }
            _ => Self::Database(e.to_string()),
        }
    }
}
