//! Key layout of the index keyspace.
//!
//! Every key starts with a one-byte tag so that all records of one kind form
//! a contiguous lexicographic range:
//!
//! | Tag | Record | Key suffix |
//! |-----|--------|------------|
//! | `V` | schema version | — |
//! | `O` | network magic | — |
//! | `R` | index state | — |
//! | `h` | height map | `u32 be height` |
//! | `t` | tx record | `32B txhash` |
//! | `T` | address→tx edge | `u8 len ‖ addr ‖ 32B txhash` |
//! | `C` | address→coin edge | `u8 len ‖ addr ‖ 32B txhash ‖ u32 be index` |
//!
//! Range-ordered fields are big-endian so a prefix scan by address, or by
//! `(address, tx)`, walks results in key order. Address digests come in two
//! widths (20 and 32 bytes); the one-byte width prefix keeps composite keys
//! self-delimiting and the two widths in disjoint ranges.

use vigil_chain::{AddrHash, Hash256, Outpoint};

/// Record-kind tags.
pub mod tag {
    /// Schema version record.
    pub const VERSION: u8 = b'V';
    /// Network magic record.
    pub const NETWORK: u8 = b'O';
    /// Index state record.
    pub const STATE: u8 = b'R';
    /// Height map records.
    pub const HEIGHT: u8 = b'h';
    /// Transaction records.
    pub const TX: u8 = b't';
    /// Address→tx edges.
    pub const ADDR_TX: u8 = b'T';
    /// Address→coin edges.
    pub const ADDR_COIN: u8 = b'C';
}

/// Longest possible key suffix after any prefix; used by [`prefix_max`].
const MAX_SUFFIX: usize = 1 + 32 + 32 + 4;

/// Key of the schema version record.
pub fn version_key() -> [u8; 1] {
    [tag::VERSION]
}

/// Key of the network magic record.
pub fn network_key() -> [u8; 1] {
    [tag::NETWORK]
}

/// Key of the index state record.
pub fn state_key() -> [u8; 1] {
    [tag::STATE]
}

/// Height map key for `height`.
pub fn height_key(height: u32) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[0] = tag::HEIGHT;
    key[1..].copy_from_slice(&height.to_be_bytes());
    key
}

/// Transaction record key for `hash`.
pub fn tx_key(hash: &Hash256) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = tag::TX;
    key[1..].copy_from_slice(hash.as_bytes());
    key
}

fn addr_prefix(tag: u8, addr: &AddrHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + addr.len() + 32 + 4);
    key.push(tag);
    key.push(addr.len() as u8);
    key.extend_from_slice(addr.as_bytes());
    key
}

/// Address→tx edge key.
pub fn addr_tx_key(addr: &AddrHash, txhash: &Hash256) -> Vec<u8> {
    let mut key = addr_prefix(tag::ADDR_TX, addr);
    key.extend_from_slice(txhash.as_bytes());
    key
}

/// Prefix covering all tx edges of one address.
pub fn addr_tx_prefix(addr: &AddrHash) -> Vec<u8> {
    addr_prefix(tag::ADDR_TX, addr)
}

/// Address→coin edge key.
pub fn addr_coin_key(addr: &AddrHash, txhash: &Hash256, index: u32) -> Vec<u8> {
    let mut key = addr_prefix(tag::ADDR_COIN, addr);
    key.extend_from_slice(txhash.as_bytes());
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// Prefix covering all coin edges of one address.
pub fn addr_coin_prefix(addr: &AddrHash) -> Vec<u8> {
    addr_prefix(tag::ADDR_COIN, addr)
}

/// Smallest key sharing `prefix`.
pub fn prefix_min(prefix: &[u8]) -> Vec<u8> {
    prefix.to_vec()
}

/// Largest key sharing `prefix`.
pub fn prefix_max(prefix: &[u8]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.extend(std::iter::repeat(0xff).take(MAX_SUFFIX));
    key
}

/// Parse the tx hash out of an address→tx edge key.
pub fn parse_addr_tx_key(key: &[u8]) -> Option<Hash256> {
    if key.len() < 2 || key[0] != tag::ADDR_TX {
        return None;
    }
    let addr_len = key[1] as usize;
    let rest = key.get(2 + addr_len..)?;
    Hash256::from_slice(rest)
}

/// Parse the outpoint out of an address→coin edge key.
pub fn parse_addr_coin_key(key: &[u8]) -> Option<Outpoint> {
    if key.len() < 2 || key[0] != tag::ADDR_COIN {
        return None;
    }
    let addr_len = key[1] as usize;
    let rest = key.get(2 + addr_len..)?;
    if rest.len() != 36 {
        return None;
    }
    let hash = Hash256::from_slice(&rest[..32])?;
    let index = u32::from_be_bytes(rest[32..].try_into().ok()?);
    Some(Outpoint::new(hash, index))
}
