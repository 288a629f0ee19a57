//! RocksDB database implementation.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{BlockBasedOptions, Cache, DBCompressionType, Direction, IteratorMode, Options, DB};
use tracing::{debug, info};

use crate::{BatchOp, Store, StoreResult, WriteBatch};

/// Tuning options for the on-disk store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// File-descriptor budget for the database.
    pub max_files: u32,
    /// Block cache size in bytes.
    pub cache_size: usize,
    /// Whether to compress data blocks.
    pub compression: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_files: 64,
            cache_size: 16 * 1024 * 1024,
            compression: true,
        }
    }
}

/// RocksDB-backed ordered store.
pub struct Database {
    db: Arc<DB>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, config: &StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(?path, "opening index database");

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(config.max_files as i32);
        opts.set_compression_type(if config.compression {
            DBCompressionType::Lz4
        } else {
            DBCompressionType::None
        });
        opts.set_keep_log_file_num(1);

        // One shared LRU cache; without it RocksDB grows an unbounded default
        // cache per table.
        let block_cache = Cache::new_lru_cache(config.cache_size);
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&block_cache);
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, path)?;
        debug!("index database opened");

        Ok(Self { db: Arc::new(db) })
    }
}

impl Store for Database {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put { key, value } => rocks_batch.put(&key, &value),
                BatchOp::Delete { key } => rocks_batch.delete(&key),
            }
        }
        self.db.write(rocks_batch)?;
        Ok(())
    }

    fn scan(&self, gte: &[u8], lte: &[u8], reverse: bool) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mode = if reverse {
            IteratorMode::From(lte, Direction::Reverse)
        } else {
            IteratorMode::From(gte, Direction::Forward)
        };

        let mut entries = Vec::new();
        for item in self.db.iterator(mode) {
            let (key, value) = item?;
            let in_range = if reverse {
                key.as_ref() >= gte
            } else {
                key.as_ref() <= lte
            };
            if !in_range {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}
