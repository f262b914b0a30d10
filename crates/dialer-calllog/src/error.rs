//! Error types for the call log store.

/// Errors that can occur during call log operations.
#[derive(Debug, thiserror::Error)]
pub enum CallLogError {
    /// A database operation failed.
    #[error("call log database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A write was rejected before reaching the database.
    #[error("invalid call log write: {0}")]
    Invalid(String),
}
