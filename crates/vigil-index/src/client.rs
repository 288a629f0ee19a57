//! Chain producer contract.
//!
//! The producer is modeled as an event source plus a read-only query
//! surface. Events arrive over a bounded channel — a slow index engine
//! blocks the producer rather than buffering unboundedly — and queries are
//! answered synchronously. The engine serializes both through its own lock.

use tokio::sync::mpsc;
use vigil_chain::{Block, ChainEntry, CoinView, Hash256, Transaction};

use crate::error::IndexResult;

/// Depth of the event channel handed to the engine.
///
/// Producers block once this many events are in flight.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// A block lookup key: by hash or by height on the producer's best chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOrHeight {
    /// Lookup by block hash.
    Hash(Hash256),
    /// Lookup by height on the best chain.
    Height(u32),
}

impl From<Hash256> for HashOrHeight {
    fn from(hash: Hash256) -> Self {
        HashOrHeight::Hash(hash)
    }
}

impl From<u32> for HashOrHeight {
    fn from(height: u32) -> Self {
        HashOrHeight::Height(height)
    }
}

/// An event emitted by the chain producer.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A block was appended to the best chain.
    Connect {
        /// Handle of the appended block.
        entry: ChainEntry,
        /// The appended block.
        block: Block,
        /// Resolution of the outputs its inputs spend.
        view: CoinView,
    },
    /// The tip block was removed from the best chain.
    Disconnect {
        /// Handle of the removed block.
        entry: ChainEntry,
        /// The removed block.
        block: Block,
        /// Resolution of the outputs its inputs spent.
        view: CoinView,
    },
    /// The producer discarded its chain down to `tip`.
    Reset {
        /// New producer tip.
        tip: ChainEntry,
    },
    /// An unconfirmed transaction was observed.
    Transaction {
        /// The unconfirmed transaction.
        tx: Transaction,
    },
}

/// Read-only query surface plus event subscription of a chain producer.
///
/// `get_entry` answers only for blocks on the producer's current best chain;
/// `get_block` serves any block the producer still stores, including ones a
/// reorganization has orphaned.
pub trait ChainClient: Send + Sync {
    /// Producer-side hook invoked when the engine opens.
    fn connect(&self) -> IndexResult<()> {
        Ok(())
    }

    /// Producer-side hook invoked when the engine closes; no further events
    /// will be delivered afterwards.
    fn disconnect(&self) -> IndexResult<()> {
        Ok(())
    }

    /// Subscribe to chain events.
    fn subscribe(&self) -> mpsc::Receiver<ChainEvent>;

    /// Get a best-chain entry; `None` if the producer does not recognize the
    /// hash (or height) as part of its best chain.
    fn get_entry(&self, query: HashOrHeight) -> IndexResult<Option<ChainEntry>>;

    /// Get a stored block by hash.
    fn get_block(&self, hash: &Hash256) -> IndexResult<Block>;

    /// Get the best-chain successor of `entry`, if any.
    fn get_next(&self, entry: &ChainEntry) -> IndexResult<Option<ChainEntry>>;

    /// Get the best-chain hashes for the inclusive height range
    /// `[start, end]`, in height order.
    fn get_hashes(&self, start: u32, end: u32) -> IndexResult<Vec<Hash256>>;

    /// Get the best-chain tip entry.
    fn get_tip(&self) -> IndexResult<ChainEntry>;

    /// Resolve the outputs spent by `block`'s inputs.
    ///
    /// The default returns a partial view; indexers then skip input-side
    /// edges during catch-up. Producers that keep undo data should override
    /// this with a complete view.
    fn get_spent_view(&self, block: &Block) -> IndexResult<CoinView> {
        let _ = block;
        Ok(CoinView::partial())
    }
}

/// A producer with a one-block chain and no events; used by isolated tests.
pub struct NullClient {
    genesis: ChainEntry,
}

impl NullClient {
    /// Create a null producer.
    pub fn new() -> Self {
        Self {
            genesis: ChainEntry {
                hash: Hash256::ZERO,
                height: 0,
                time: 0,
                prev: Hash256::ZERO,
            },
        }
    }
}

impl Default for NullClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainClient for NullClient {
    fn subscribe(&self) -> mpsc::Receiver<ChainEvent> {
        // The sender is dropped immediately: the channel yields no events.
        let (_tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        rx
    }

    fn get_entry(&self, query: HashOrHeight) -> IndexResult<Option<ChainEntry>> {
        let found = match query {
            HashOrHeight::Hash(hash) => hash == self.genesis.hash,
            HashOrHeight::Height(height) => height == 0,
        };
        Ok(found.then_some(self.genesis))
    }

    fn get_block(&self, hash: &Hash256) -> IndexResult<Block> {
        debug_assert_eq!(*hash, self.genesis.hash);
        Ok(Block {
            hash: self.genesis.hash,
            prev: Hash256::ZERO,
            time: 0,
            txs: Vec::new(),
        })
    }

    fn get_next(&self, _entry: &ChainEntry) -> IndexResult<Option<ChainEntry>> {
        Ok(None)
    }

    fn get_hashes(&self, start: u32, end: u32) -> IndexResult<Vec<Hash256>> {
        if start == 0 && end == 0 {
            Ok(vec![self.genesis.hash])
        } else {
            Ok(Vec::new())
        }
    }

    fn get_tip(&self) -> IndexResult<ChainEntry> {
        Ok(self.genesis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_client_queries() {
        let client = NullClient::new();

        let tip = client.get_tip().unwrap();
        assert_eq!(tip.height, 0);
        assert!(client.get_entry(tip.hash.into()).unwrap().is_some());
        assert!(client.get_entry(1u32.into()).unwrap().is_none());
        assert!(client.get_next(&tip).unwrap().is_none());
        assert_eq!(client.get_hashes(0, 0).unwrap(), vec![tip.hash]);
    }

    #[test]
    fn test_null_client_emits_nothing() {
        let client = NullClient::new();
        let mut rx = client.subscribe();
        // Sender side is gone, so the stream is immediately finished.
        assert!(rx.try_recv().is_err());
    }
}
