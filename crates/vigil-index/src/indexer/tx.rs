//! Transaction-by-hash index.

use vigil_chain::{Block, ChainEntry, CoinView};

use super::{IndexBatch, Indexer};
use crate::error::IndexResult;
use crate::layout::{self, tag};
use crate::records::TxMeta;

/// Maps `txhash → extended-tx record` for every confirmed transaction.
///
/// A confirmed transaction appears in exactly one active block, so the most
/// recent write for a hash wins; hash collisions across blocks need no
/// special handling.
pub struct TxIndexer;

impl Indexer for TxIndexer {
    fn name(&self) -> &'static str {
        "tx"
    }

    fn prefixes(&self) -> &'static [u8] {
        &[tag::TX]
    }

    fn index_block(
        &self,
        batch: &mut IndexBatch<'_>,
        entry: &ChainEntry,
        block: &Block,
        _view: &CoinView,
    ) -> IndexResult<()> {
        for (index, tx) in block.txs.iter().enumerate() {
            let meta = TxMeta {
                block: entry.hash,
                height: entry.height,
                time: entry.time,
                index: index as u32,
                raw: tx.raw.clone(),
            };
            batch.put(layout::tx_key(&tx.hash).to_vec(), meta.encode())?;
        }
        Ok(())
    }

    fn unindex_block(
        &self,
        batch: &mut IndexBatch<'_>,
        _entry: &ChainEntry,
        block: &Block,
        _view: &CoinView,
    ) -> IndexResult<()> {
        for tx in &block.txs {
            batch.delete(layout::tx_key(&tx.hash).to_vec())?;
        }
        Ok(())
    }
}
