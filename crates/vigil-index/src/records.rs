//! Persisted record encodings.
//!
//! Scalars inside values are little-endian; only key fields that need range
//! ordering use big-endian (see `layout`).

use vigil_chain::Hash256;

use crate::error::{IndexError, IndexResult};

/// ASCII tag stored in the schema record.
pub const SCHEMA_TAG: &[u8] = b"indexers";

/// Schema version stored alongside the tag.
pub const SCHEMA_VERSION: u32 = 0;

/// The persisted index cursor.
///
/// `height` is the greatest height whose indexing has fully committed;
/// `start_height`/`start_hash` mark the earliest block for which the indexes
/// are known-complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexState {
    /// Earliest known-complete height.
    pub start_height: u32,
    /// Hash at `start_height`.
    pub start_hash: Hash256,
    /// Highest fully committed height.
    pub height: u32,
}

impl IndexState {
    /// Encoded record width.
    pub const SIZE: usize = 4 + 32 + 4;

    /// Serialize to the 40-byte state record.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.start_height.to_le_bytes());
        buf[4..36].copy_from_slice(self.start_hash.as_bytes());
        buf[36..40].copy_from_slice(&self.height.to_le_bytes());
        buf
    }

    /// Deserialize from a state record.
    pub fn decode(data: &[u8]) -> IndexResult<Self> {
        if data.len() != Self::SIZE {
            return Err(IndexError::Corruption(format!(
                "index state record has {} bytes, expected {}",
                data.len(),
                Self::SIZE
            )));
        }

        let start_height = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let start_hash = Hash256::from_slice(&data[4..36]).unwrap();
        let height = u32::from_le_bytes(data[36..40].try_into().unwrap());

        Ok(Self {
            start_height,
            start_hash,
            height,
        })
    }
}

/// Extended transaction record stored under the `t` tag.
///
/// Carries everything needed to answer a tx-by-hash lookup without touching
/// the primary chain store: the raw transaction plus its confirmed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMeta {
    /// Hash of the containing block.
    pub block: Hash256,
    /// Height of the containing block.
    pub height: u32,
    /// Timestamp of the containing block.
    pub time: u32,
    /// Position of the transaction within the block.
    pub index: u32,
    /// Raw serialized transaction.
    pub raw: Vec<u8>,
}

impl TxMeta {
    const HEADER: usize = 32 + 4 + 4 + 4;

    /// Serialize to the extended-tx record.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER + self.raw.len());
        buf.extend_from_slice(self.block.as_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.time.to_le_bytes());
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.extend_from_slice(&self.raw);
        buf
    }

    /// Deserialize from an extended-tx record.
    pub fn decode(data: &[u8]) -> IndexResult<Self> {
        if data.len() < Self::HEADER {
            return Err(IndexError::Corruption(format!(
                "tx record has {} bytes, expected at least {}",
                data.len(),
                Self::HEADER
            )));
        }

        let block = Hash256::from_slice(&data[0..32]).unwrap();
        let height = u32::from_le_bytes(data[32..36].try_into().unwrap());
        let time = u32::from_le_bytes(data[36..40].try_into().unwrap());
        let index = u32::from_le_bytes(data[40..44].try_into().unwrap());
        let raw = data[44..].to_vec();

        Ok(Self {
            block,
            height,
            time,
            index,
            raw,
        })
    }
}

/// Encode the network magic record.
pub fn encode_magic(magic: u32) -> [u8; 4] {
    magic.to_le_bytes()
}

/// Decode the network magic record.
pub fn decode_magic(data: &[u8]) -> IndexResult<u32> {
    let bytes: [u8; 4] = data
        .try_into()
        .map_err(|_| IndexError::Corruption(format!("magic record has {} bytes", data.len())))?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        let state = IndexState {
            start_height: 1000,
            start_hash: Hash256::digest(b"start"),
            height: 123_456,
        };
        let encoded = state.encode();
        assert_eq!(encoded.len(), IndexState::SIZE);
        assert_eq!(IndexState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn test_state_rejects_bad_length() {
        assert!(IndexState::decode(&[0u8; 39]).is_err());
        assert!(IndexState::decode(&[0u8; 41]).is_err());
    }

    #[test]
    fn test_tx_meta_roundtrip() {
        let meta = TxMeta {
            block: Hash256::digest(b"block"),
            height: 42,
            time: 1_650_000_000,
            index: 3,
            raw: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let decoded = TxMeta::decode(&meta.encode()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn test_tx_meta_empty_raw() {
        let meta = TxMeta {
            block: Hash256::digest(b"block"),
            height: 0,
            time: 0,
            index: 0,
            raw: Vec::new(),
        };
        assert_eq!(TxMeta::decode(&meta.encode()).unwrap(), meta);
        assert!(TxMeta::decode(&[0u8; 43]).is_err());
    }

    #[test]
    fn test_magic_roundtrip() {
        let encoded = encode_magic(0xd9b4_bef9);
        assert_eq!(decode_magic(&encoded).unwrap(), 0xd9b4_bef9);
        assert!(decode_magic(&encoded[..3]).is_err());
    }
}
