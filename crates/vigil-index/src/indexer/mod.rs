//! Indexer plugin stack.
//!
//! Each indexer contributes forward and inverse mutations for a block into a
//! batch owned by the coordinator, which commits them together with the tip
//! update. Indexers declare the key tags they own and cannot write outside
//! them.

mod addr;
mod tx;

pub use addr::AddrIndexer;
pub use tx::TxIndexer;

use vigil_chain::{Block, ChainEntry, CoinView, Transaction};
use vigil_storage::WriteBatch;

use crate::error::{IndexError, IndexResult};

/// Batch handle given to an indexer, restricted to its declared key tags.
pub struct IndexBatch<'a> {
    batch: &'a mut WriteBatch,
    prefixes: &'static [u8],
}

impl<'a> IndexBatch<'a> {
    pub(crate) fn new(batch: &'a mut WriteBatch, prefixes: &'static [u8]) -> Self {
        Self { batch, prefixes }
    }

    fn check(&self, key: &[u8]) -> IndexResult<()> {
        match key.first() {
            Some(tag) if self.prefixes.contains(tag) => Ok(()),
            _ => Err(IndexError::InvariantViolation(format!(
                "indexer wrote key {} outside its declared prefixes",
                hex::encode(key)
            ))),
        }
    }

    /// Record a put.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> IndexResult<()> {
        self.check(&key)?;
        self.batch.put(key, value);
        Ok(())
    }

    /// Record a delete.
    pub fn delete(&mut self, key: Vec<u8>) -> IndexResult<()> {
        self.check(&key)?;
        self.batch.delete(key);
        Ok(())
    }
}

/// A pluggable index over confirmed chain data.
///
/// Implementations must be pure with respect to their inputs: for the same
/// `(entry, block, view)`, `index_block` followed by `unindex_block` over the
/// same store is a no-op.
pub trait Indexer: Send + Sync {
    /// Identifier used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Key tags this indexer owns.
    fn prefixes(&self) -> &'static [u8];

    /// Record forward mutations for a connected block.
    fn index_block(
        &self,
        batch: &mut IndexBatch<'_>,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> IndexResult<()>;

    /// Record the exact inverse mutations for a disconnected block.
    fn unindex_block(
        &self,
        batch: &mut IndexBatch<'_>,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> IndexResult<()>;

    /// Observe an unconfirmed transaction. No-op for the on-chain indexes.
    fn observe_tx(&self, tx: &Transaction) {
        let _ = tx;
    }
}

/// Resolve configured identifiers into the indexer stack, preserving order.
pub fn build_indexers(idents: &[String]) -> IndexResult<Vec<Box<dyn Indexer>>> {
    idents
        .iter()
        .map(|ident| match ident.as_str() {
            "tx" => Ok(Box::new(TxIndexer) as Box<dyn Indexer>),
            "addr" => Ok(Box::new(AddrIndexer) as Box<dyn Indexer>),
            other => Err(IndexError::UnknownIndexer(other.to_string())),
        })
        .collect()
}
