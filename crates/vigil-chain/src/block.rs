//! Blocks, transactions, and block handles.

use crate::{AddrHash, Hash256, Outpoint};

/// The producer's lightweight handle for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    /// Block hash.
    pub hash: Hash256,
    /// Block height.
    pub height: u32,
    /// Block timestamp (seconds).
    pub time: u32,
    /// Hash of the previous block.
    pub prev: Hash256,
}

/// A compact block handle kept by the index engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    /// Block hash.
    pub hash: Hash256,
    /// Block height.
    pub height: u32,
    /// Block timestamp (seconds).
    pub time: u32,
}

impl From<&ChainEntry> for BlockMeta {
    fn from(entry: &ChainEntry) -> Self {
        Self {
            hash: entry.hash,
            height: entry.height,
            time: entry.time,
        }
    }
}

/// A transaction input: the outpoint it spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input {
    /// Spent output reference; null for coinbase.
    pub prevout: Outpoint,
}

impl Input {
    /// Create an input spending the given outpoint.
    pub fn new(prevout: Outpoint) -> Self {
        Self { prevout }
    }

    /// The coinbase input.
    pub fn coinbase() -> Self {
        Self {
            prevout: Outpoint::null(),
        }
    }
}

/// A transaction output: its value and the recipient's address digest.
///
/// Outputs whose script has no extractable recipient (e.g. data carriers)
/// carry `None` and are skipped by the address indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    /// Output value in base units.
    pub value: u64,
    /// Address digest of the recipient, if any.
    pub address: Option<AddrHash>,
}

impl Output {
    /// Create an output paying to an address.
    pub fn new(value: u64, address: AddrHash) -> Self {
        Self {
            value,
            address: Some(address),
        }
    }

    /// Create an output with no extractable recipient.
    pub fn opaque(value: u64) -> Self {
        Self {
            value,
            address: None,
        }
    }
}

/// A confirmed transaction as supplied by the chain producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: Hash256,
    /// Raw serialized transaction; opaque to the engine.
    pub raw: Vec<u8>,
    /// Inputs in order.
    pub inputs: Vec<Input>,
    /// Outputs in order.
    pub outputs: Vec<Output>,
}

impl Transaction {
    /// Whether this is the block subsidy transaction (single null input).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }
}

/// A full block as supplied by the chain producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block hash.
    pub hash: Hash256,
    /// Hash of the previous block.
    pub prev: Hash256,
    /// Block timestamp (seconds).
    pub time: u32,
    /// Transactions in block order.
    pub txs: Vec<Transaction>,
}
