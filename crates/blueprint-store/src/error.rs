//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by [`crate::Store`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A project or chat that the operation depends on does not exist.
    #[error("record not found")]
    NotFound,

    /// `RocksDB` rejected the read or write.
    #[error("database error: {0}")]
    Database(String),

    /// A stored record could not be encoded or decoded as CBOR.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the error means a referenced record is missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}
