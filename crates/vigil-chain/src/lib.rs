//! # vigil-chain
//!
//! Chain data model consumed by the vigil index engine.
//!
//! This crate provides the typed hashes and producer-shaped block values the
//! index engine operates on:
//! - `Hash256`: 32-byte block and transaction identifiers
//! - `AddrHash`: 20- or 32-byte address digests
//! - `ChainEntry` / `BlockMeta`: lightweight block handles
//! - `Block` / `Transaction`: confirmed chain data as supplied by a producer
//! - `CoinView`: resolution of spent outputs for input-side indexing
//!
//! The engine treats raw transaction bytes as opaque; consensus rules and
//! wire serialization belong to the chain producer.

mod block;
mod hash;
mod view;

pub use block::{Block, BlockMeta, ChainEntry, Input, Output, Transaction};
pub use hash::{AddrHash, Hash256, Outpoint};
pub use view::{Coin, CoinView};
