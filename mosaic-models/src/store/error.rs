//! Error types for the backing store.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert hit an existing primary key.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Update targeted a key that does not exist.
    #[error("missing key: {0}")]
    Missing(String),

    /// The on-disk document was written by an unknown codec version.
    #[error("unsupported document version: {0}")]
    UnsupportedVersion(u32),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
