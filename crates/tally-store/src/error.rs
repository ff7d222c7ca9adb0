//! Error types for tally storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
///
/// Business outcomes (insufficient funds, invalid code, already subscribed)
/// are not errors; they are returned as typed outcomes from the compound
/// operations. These variants cover genuine faults only.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// A mutation was requested with a non-positive amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),
}
