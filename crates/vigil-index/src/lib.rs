//! # vigil-index
//!
//! Reorg-safe secondary-index engine over a chain producer.
//!
//! The engine observes a primary chain database through the [`ChainClient`]
//! contract and maintains auxiliary indexes for fast lookup of transactions
//! by hash and of transactions/outputs by address. Its on-disk state is, at
//! every observable instant, consistent with some prefix of the producer's
//! best chain:
//!
//! - Per-block index mutations and the tip update commit in one atomic batch
//! - Disconnects reverse a block's mutations in the same batch that
//!   decrements the tip
//! - On startup the engine walks back to the last block the producer still
//!   recognizes and rescans forward from there
//!
//! ## Architecture
//!
//! ```text
//! ChainClient (events + queries)
//!       │
//!       ▼
//!    IndexDb ── exclusion lock, tip tracker, sync loop
//!       ├── TxIndexer    (txhash → extended tx record)
//!       ├── AddrIndexer  (address → tx edges, coin edges)
//!       └── Store        (ordered KV, atomic batches)
//! ```

mod client;
mod config;
mod db;
mod error;
mod indexer;
mod records;

pub mod layout;

pub use client::{ChainClient, ChainEvent, HashOrHeight, NullClient, EVENT_QUEUE_DEPTH};
pub use config::{IndexConfig, Network};
pub use db::{IndexDb, SyncStatus};
pub use error::{IndexError, IndexResult};
pub use indexer::{build_indexers, AddrIndexer, IndexBatch, Indexer, TxIndexer};
pub use records::{IndexState, TxMeta, SCHEMA_TAG, SCHEMA_VERSION};
