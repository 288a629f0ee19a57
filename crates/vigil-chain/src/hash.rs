//! Typed hashes and outpoints.

use std::fmt;

/// A 32-byte block or transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero hash.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a byte slice; `None` if the length is not 32.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Blake2b-256 digest of arbitrary input.
    pub fn digest(data: &[u8]) -> Self {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&result);
        Self(arr)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}

/// The digest of an output script's recipient.
///
/// Producers emit either 20-byte (hash160) or 32-byte (hash256) address
/// digests depending on the script class; both kinds index side by side.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrHash {
    /// 20-byte address digest.
    Hash160([u8; 20]),
    /// 32-byte address digest.
    Hash256([u8; 32]),
}

impl AddrHash {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AddrHash::Hash160(b) => b,
            AddrHash::Hash256(b) => b,
        }
    }

    /// Digest width in bytes (20 or 32).
    pub fn len(&self) -> usize {
        match self {
            AddrHash::Hash160(_) => 20,
            AddrHash::Hash256(_) => 32,
        }
    }

    /// Always false; an address digest has a fixed non-zero width.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Rebuild from raw bytes; `None` unless the length is 20 or 32.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            20 => {
                let mut arr = [0u8; 20];
                arr.copy_from_slice(bytes);
                Some(AddrHash::Hash160(arr))
            }
            32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(bytes);
                Some(AddrHash::Hash256(arr))
            }
            _ => None,
        }
    }
}

impl fmt::Display for AddrHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for AddrHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddrHash({})", hex::encode(self.as_bytes()))
    }
}

/// A pair `(txhash, index)` identifying a transaction output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Outpoint {
    /// Hash of the creating transaction.
    pub hash: Hash256,
    /// Output position within that transaction.
    pub index: u32,
}

impl Outpoint {
    /// Create an outpoint.
    pub const fn new(hash: Hash256, index: u32) -> Self {
        Self { hash, index }
    }

    /// The null outpoint used by coinbase inputs.
    pub const fn null() -> Self {
        Self {
            hash: Hash256::ZERO,
            index: u32::MAX,
        }
    }

    /// Whether this is the coinbase null outpoint.
    pub fn is_null(&self) -> bool {
        self.index == u32::MAX && self.hash.is_zero()
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_digest_deterministic() {
        let a = Hash256::digest(b"block");
        let b = Hash256::digest(b"block");
        assert_eq!(a, b);
        assert_ne!(a, Hash256::digest(b"other"));
        assert!(!a.is_zero());
    }

    #[test]
    fn test_hash_from_slice() {
        let h = Hash256::digest(b"x");
        assert_eq!(Hash256::from_slice(h.as_ref()), Some(h));
        assert_eq!(Hash256::from_slice(&[0u8; 31]), None);
    }

    #[test]
    fn test_addr_hash_widths() {
        let short = AddrHash::Hash160([7u8; 20]);
        let long = AddrHash::Hash256([9u8; 32]);
        assert_eq!(short.len(), 20);
        assert_eq!(long.len(), 32);
        assert_eq!(AddrHash::from_slice(short.as_bytes()), Some(short));
        assert_eq!(AddrHash::from_slice(long.as_bytes()), Some(long));
        assert_eq!(AddrHash::from_slice(&[0u8; 21]), None);
    }

    #[test]
    fn test_null_outpoint() {
        assert!(Outpoint::null().is_null());
        assert!(!Outpoint::new(Hash256::digest(b"tx"), 0).is_null());
        // A zero hash with a real index is not the null outpoint.
        assert!(!Outpoint::new(Hash256::ZERO, 0).is_null());
    }
}
