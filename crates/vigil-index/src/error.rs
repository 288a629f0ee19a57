//! Error types for the index engine.

use thiserror::Error;
use vigil_storage::StoreError;

/// Index-engine errors.
///
/// Everything except [`IndexError::Store`] and [`IndexError::Client`] marks a
/// condition that is only recoverable by restart and re-sync; the engine
/// emits the error and refuses to advance the tip.
#[derive(Error, Debug, Clone)]
pub enum IndexError {
    /// Stored network magic differs from the configured network.
    #[error("network mismatch: stored magic {stored:#010x}, configured {configured:#010x}")]
    NetworkMismatch {
        /// Magic found in the store.
        stored: u32,
        /// Magic selected by configuration.
        configured: u32,
    },

    /// Stored schema tag or version differs from this build.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Disconnect of genesis or of a block that is not the indexed tip.
    #[error("bad disconnect: {0}")]
    BadDisconnect(String),

    /// A precondition the chain producer must uphold was violated.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A persisted record failed to decode.
    #[error("record corruption: {0}")]
    Corruption(String),

    /// Underlying key-value store failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Chain producer query failure.
    #[error("chain client error: {0}")]
    Client(String),

    /// A configured indexer identifier is not known.
    #[error("unknown indexer: {0}")]
    UnknownIndexer(String),

    /// The engine has been closed.
    #[error("index database is closed")]
    Closed,
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
