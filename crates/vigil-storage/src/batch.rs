//! Write batch for atomic operations.

/// A single batched mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Put a key-value pair.
    Put {
        /// Key to write.
        key: Vec<u8>,
        /// Value to write.
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key to remove.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } => key,
            BatchOp::Delete { key } => key,
        }
    }
}

/// A batch of write operations executed atomically.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create a new empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a batch with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Add a put operation.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Add a delete operation.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    /// Number of operations in the batch.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch holds no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Clear all operations.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Append another batch's operations to this one.
    pub fn merge(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    /// The collected operations, in insertion order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_collects_ops() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.delete(b"b".to_vec());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[0].key(), b"a");
        assert_eq!(batch.ops()[1].key(), b"b");

        let mut other = WriteBatch::new();
        other.put(b"c".to_vec(), b"3".to_vec());
        batch.merge(other);
        assert_eq!(batch.len(), 3);

        batch.clear();
        assert!(batch.is_empty());
    }
}
