//! Address index: tx edges and coin edges.

use std::collections::BTreeSet;

use tracing::debug;
use vigil_chain::{AddrHash, Block, ChainEntry, CoinView, Transaction};

use super::{IndexBatch, Indexer};
use crate::error::{IndexError, IndexResult};
use crate::layout::{self, tag};

/// Maps addresses to the transactions and unspent coins that touch them.
///
/// Two presence-only edge sets are maintained:
/// - `(addr, txhash)` for every transaction whose outputs pay the address or
///   whose inputs spend one of its coins
/// - `(addr, txhash, index)` for every unspent output paying the address
///
/// Input-side edges need the coin view to resolve spent outputs. Against a
/// partial view (catch-up) they are skipped and restored by later forward
/// connects; against a complete view a missing coin is a producer bug.
pub struct AddrIndexer;

/// The set of address digests `tx` touches under `view`, in a fixed order.
fn tx_addresses(tx: &Transaction, view: &CoinView) -> BTreeSet<AddrHash> {
    let mut addrs = BTreeSet::new();
    for output in &tx.outputs {
        if let Some(addr) = output.address {
            addrs.insert(addr);
        }
    }
    if !tx.is_coinbase() {
        for input in &tx.inputs {
            if let Some(coin) = view.output(&input.prevout) {
                if let Some(addr) = coin.address {
                    addrs.insert(addr);
                }
            }
        }
    }
    addrs
}

impl AddrIndexer {
    /// Apply the input-side coin-edge mutations for `tx`.
    ///
    /// Connecting a block removes the coins its inputs spend; disconnecting
    /// restores them.
    fn spend_inputs(
        &self,
        batch: &mut IndexBatch<'_>,
        tx: &Transaction,
        view: &CoinView,
        restore: bool,
    ) -> IndexResult<()> {
        if tx.is_coinbase() {
            return Ok(());
        }

        for input in &tx.inputs {
            let prevout = &input.prevout;
            let coin = match view.output(prevout) {
                Some(coin) => coin,
                None if view.is_complete() => {
                    return Err(IndexError::InvariantViolation(format!(
                        "coin view is missing spent output {prevout}"
                    )));
                }
                None => {
                    debug!(%prevout, "skipping input edge: coin not in view");
                    continue;
                }
            };

            if let Some(addr) = coin.address {
                let key = layout::addr_coin_key(&addr, &prevout.hash, prevout.index);
                if restore {
                    batch.put(key, Vec::new())?;
                } else {
                    batch.delete(key)?;
                }
            }
        }
        Ok(())
    }
}

impl Indexer for AddrIndexer {
    fn name(&self) -> &'static str {
        "addr"
    }

    fn prefixes(&self) -> &'static [u8] {
        &[tag::ADDR_TX, tag::ADDR_COIN]
    }

    fn index_block(
        &self,
        batch: &mut IndexBatch<'_>,
        _entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> IndexResult<()> {
        for tx in &block.txs {
            for addr in tx_addresses(tx, view) {
                batch.put(layout::addr_tx_key(&addr, &tx.hash), Vec::new())?;
            }

            self.spend_inputs(batch, tx, view, false)?;

            for (index, output) in tx.outputs.iter().enumerate() {
                if let Some(addr) = output.address {
                    batch.put(
                        layout::addr_coin_key(&addr, &tx.hash, index as u32),
                        Vec::new(),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn unindex_block(
        &self,
        batch: &mut IndexBatch<'_>,
        _entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> IndexResult<()> {
        for tx in &block.txs {
            for addr in tx_addresses(tx, view) {
                batch.delete(layout::addr_tx_key(&addr, &tx.hash))?;
            }

            self.spend_inputs(batch, tx, view, true)?;

            for (index, output) in tx.outputs.iter().enumerate() {
                if let Some(addr) = output.address {
                    batch.delete(layout::addr_coin_key(&addr, &tx.hash, index as u32))?;
                }
            }
        }
        Ok(())
    }
}
