//! In-memory store backed by an ordered map.
//!
//! Used when the engine runs with `memory: true` and throughout tests; the
//! contents are lost when the store is dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{BatchOp, Store, StoreResult, WriteBatch};

/// Ephemeral ordered store.
#[derive(Default)]
pub struct MemoryStore {
    map: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
        }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut map = self.map.write();
        for op in batch.ops {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, gte: &[u8], lte: &[u8], reverse: bool) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        if gte > lte {
            return Ok(Vec::new());
        }
        let map = self.map.read();
        let range = map.range::<[u8], _>((
            std::ops::Bound::Included(gte),
            std::ops::Bound::Included(lte),
        ));
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> =
            range.map(|(k, v)| (k.clone(), v.clone())).collect();
        if reverse {
            entries.reverse();
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_apply() {
        let store = MemoryStore::new();

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.delete(b"a".to_vec());
        store.write_batch(batch).unwrap();

        assert_eq!(store.get(b"a").unwrap(), None);
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_scan_matches_disk_semantics() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for byte in [0x01u8, 0x02, 0x03] {
            batch.put(vec![b'p', byte], vec![byte]);
        }
        store.write_batch(batch).unwrap();

        let forward = store.scan(&[b'p', 0x01], &[b'p', 0x02], false).unwrap();
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].0, vec![b'p', 0x01]);

        let reverse = store.scan(&[b'p', 0x01], &[b'p', 0x03], true).unwrap();
        assert_eq!(reverse[0].0, vec![b'p', 0x03]);
        assert_eq!(reverse[2].0, vec![b'p', 0x01]);

        let keys = store.scan_keys(&[b'p', 0x01], &[b'p', 0x03], false).unwrap();
        assert_eq!(keys.len(), 3);
    }
}
