//! Error types for the storage layer.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// RocksDB error.
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Schema record does not match this build.
    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Schema this build writes.
        expected: String,
        /// Schema found on disk.
        found: String,
    },

    /// Data corruption detected.
    #[error("data corruption detected: {0}")]
    Corruption(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
