//! # vigil-storage
//!
//! Ordered key-value storage layer for the vigil index engine.
//!
//! This crate provides:
//! - A `Store` trait over an ordered byte keyspace with atomic batch writes
//!   and bounded forward/reverse range scans
//! - A RocksDB-backed `Database` for on-disk operation
//! - A BTreeMap-backed `MemoryStore` for ephemeral operation and tests
//!
//! Unlike a column-family layout, the index engine keeps every record in a
//! single keyspace where the first key byte tags the record kind; range
//! scans therefore take explicit `gte`/`lte` bounds.

mod batch;
mod database;
mod error;
mod memory;

pub use batch::{BatchOp, WriteBatch};
pub use database::{Database, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

/// Ordered key-value store used by the index engine.
///
/// Mutation happens exclusively through [`WriteBatch`] so that a tip update
/// and the per-index record changes it covers always commit atomically.
pub trait Store: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Execute a batch of writes atomically.
    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Scan the inclusive key range `[gte, lte]` in key order, or in reverse
    /// key order when `reverse` is set.
    fn scan(&self, gte: &[u8], lte: &[u8], reverse: bool) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Scan the inclusive key range `[gte, lte]` returning keys only.
    fn scan_keys(&self, gte: &[u8], lte: &[u8], reverse: bool) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .scan(gte, lte, reverse)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Check if a key exists.
    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Verify the schema record under `key`.
    ///
    /// A fresh store is stamped with `tag || version_le`; an existing store
    /// must match exactly or the open is refused.
    fn verify(&self, key: &[u8], tag: &[u8], version: u32) -> StoreResult<()> {
        let mut expected = Vec::with_capacity(tag.len() + 4);
        expected.extend_from_slice(tag);
        expected.extend_from_slice(&version.to_le_bytes());

        match self.get(key)? {
            None => {
                let mut batch = WriteBatch::new();
                batch.put(key.to_vec(), expected);
                self.write_batch(batch)
            }
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(StoreError::SchemaMismatch {
                expected: format!("{}/{}", String::from_utf8_lossy(tag), version),
                found: String::from_utf8_lossy(&found).into_owned(),
            }),
        }
    }
}
