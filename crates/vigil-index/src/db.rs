//! The index database coordinator.
//!
//! `IndexDb` owns the tip tracker, the sync loop, and the indexer stack. All
//! chain events and public mutations funnel through one exclusion lock; the
//! critical section spans from picking up an event to committing its batch,
//! so the on-disk state is always consistent with some prefix of the
//! producer's chain.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use vigil_chain::{AddrHash, Block, BlockMeta, ChainEntry, CoinView, Hash256, Outpoint};
use vigil_storage::{Database, MemoryStore, Store, StoreError, WriteBatch};

use crate::client::{ChainClient, ChainEvent, HashOrHeight};
use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::indexer::{build_indexers, IndexBatch, Indexer};
use crate::layout;
use crate::records::{IndexState, TxMeta, SCHEMA_TAG, SCHEMA_VERSION};

/// Upper bound on operations per committed sub-batch during bulk writes
/// (bootstrap, height-map migration). The state record always lands in the
/// final sub-batch so a crash mid-write is recoverable.
const MAX_BATCH_OPS: usize = 10_000;

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Not yet opened, or closed.
    Closed,
    /// Opening: schema checks and initial sync in progress.
    Opening,
    /// Waiting for chain events.
    Idle,
    /// Applying forward index mutations.
    Indexing,
    /// Reversing index mutations.
    RollingBack,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Closed => write!(f, "closed"),
            SyncStatus::Opening => write!(f, "opening"),
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Indexing => write!(f, "indexing"),
            SyncStatus::RollingBack => write!(f, "rolling-back"),
        }
    }
}

/// State guarded by the exclusion lock.
struct Cursor {
    state: Option<IndexState>,
}

fn cursor_state(cursor: &Cursor) -> IndexResult<&IndexState> {
    cursor
        .state
        .as_ref()
        .ok_or_else(|| IndexError::InvariantViolation("index state not initialized".into()))
}

struct Inner {
    store: Arc<dyn Store>,
    client: Arc<dyn ChainClient>,
    indexers: Vec<Box<dyn Indexer>>,
    cursor: Mutex<Cursor>,
    status: RwLock<SyncStatus>,
    errors: Mutex<Option<mpsc::UnboundedSender<IndexError>>>,
    closed: AtomicBool,
}

/// The secondary-index engine.
pub struct IndexDb {
    inner: Arc<Inner>,
    pump: Option<tokio::task::JoinHandle<()>>,
}

impl IndexDb {
    /// Open the engine: open the store per configuration, verify schema and
    /// network binding, build the indexer stack, connect to the producer,
    /// and synchronize to its current chain.
    pub fn open(config: IndexConfig, client: Arc<dyn ChainClient>) -> IndexResult<Self> {
        let store: Arc<dyn Store> = if config.memory {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(Database::open(config.database_path(), &config.store_config())?)
        };
        Self::open_with_store(config, store, client)
    }

    /// Open the engine over an already-open store.
    pub fn open_with_store(
        config: IndexConfig,
        store: Arc<dyn Store>,
        client: Arc<dyn ChainClient>,
    ) -> IndexResult<Self> {
        store
            .verify(&layout::version_key(), SCHEMA_TAG, SCHEMA_VERSION)
            .map_err(|err| match err {
                StoreError::SchemaMismatch { expected, found } => {
                    IndexError::SchemaMismatch(format!("expected {expected}, found {found}"))
                }
                other => IndexError::Store(other),
            })?;
        verify_network(store.as_ref(), config.network.magic())?;

        let indexers = build_indexers(&config.indexers)?;
        info!(
            network = %config.network,
            indexers = indexers.len(),
            "opening index database"
        );

        let inner = Arc::new(Inner {
            store,
            client: Arc::clone(&client),
            indexers,
            cursor: Mutex::new(Cursor { state: None }),
            status: RwLock::new(SyncStatus::Opening),
            errors: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        client.connect()?;
        let pump = spawn_pump(&inner, client.subscribe());

        let synced = {
            let mut cursor = inner.cursor.lock();
            inner
                .sync_state(&mut cursor)
                .and_then(|()| inner.sync_chain(&mut cursor))
        };
        if let Err(err) = synced {
            if let Some(pump) = pump {
                pump.abort();
            }
            return Err(err);
        }
        inner.set_status(SyncStatus::Idle);

        Ok(Self { inner, pump })
    }

    /// Close the engine: disconnect from the producer, wait for any event in
    /// flight, and release the store.
    pub fn close(&mut self) -> IndexResult<()> {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.client.disconnect()?;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        // The event in flight (if any) holds the cursor lock; wait it out.
        let _cursor = self.inner.cursor.lock();
        self.inner.set_status(SyncStatus::Closed);
        info!("index database closed");
        Ok(())
    }

    /// Deliver a chain event synchronously.
    ///
    /// This is the same path the event pump drives; failures are also
    /// re-emitted on the error channel.
    pub fn notify(&self, event: ChainEvent) -> IndexResult<()> {
        self.inner.dispatch(event)
    }

    /// Subscribe to engine errors. Only the most recent subscriber receives
    /// them.
    pub fn on_error(&self) -> mpsc::UnboundedReceiver<IndexError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.errors.lock() = Some(tx);
        rx
    }

    /// Re-synchronize with the producer: adopt or bootstrap the persisted
    /// state, find the common ancestor, and scan forward.
    pub fn sync(&self) -> IndexResult<()> {
        let mut cursor = self.inner.cursor.lock();
        self.inner.sync_state(&mut cursor)?;
        self.inner.sync_chain(&mut cursor)?;
        self.inner.set_status(SyncStatus::Idle);
        Ok(())
    }

    /// Re-index from `height`: roll back to it, then scan forward to the
    /// producer's tip.
    pub fn rescan(&self, height: u32) -> IndexResult<()> {
        let mut cursor = self.inner.cursor.lock();
        self.inner.scan(&mut cursor, height)?;
        self.inner.set_status(SyncStatus::Idle);
        Ok(())
    }

    /// Record that the indexes are known-complete starting at `meta`.
    pub fn mark_state(&self, meta: &BlockMeta) -> IndexResult<()> {
        let mut cursor = self.inner.cursor.lock();
        let mut state = *cursor_state(&cursor)?;
        state.start_height = meta.height;
        state.start_hash = meta.hash;

        let mut batch = WriteBatch::new();
        batch.put(layout::state_key().to_vec(), state.encode().to_vec());
        self.inner.store.write_batch(batch)?;
        cursor.state = Some(state);

        info!(height = meta.height, hash = %meta.hash, time = meta.time, "marked index start");
        Ok(())
    }

    // ==================== Queries ====================

    /// The current index cursor, if synchronized.
    pub fn state(&self) -> Option<IndexState> {
        self.inner.cursor.lock().state
    }

    /// The current engine status.
    pub fn status(&self) -> SyncStatus {
        *self.inner.status.read()
    }

    /// The indexed block hash at `height`, if any.
    pub fn height_hash(&self, height: u32) -> IndexResult<Option<Hash256>> {
        match self.inner.store.get(&layout::height_key(height))? {
            None => Ok(None),
            Some(bytes) => Hash256::from_slice(&bytes)
                .map(Some)
                .ok_or_else(|| IndexError::Corruption(format!("bad height map entry at {height}"))),
        }
    }

    /// Look up a confirmed transaction by hash.
    pub fn tx_meta(&self, hash: &Hash256) -> IndexResult<Option<TxMeta>> {
        match self.inner.store.get(&layout::tx_key(hash))? {
            None => Ok(None),
            Some(bytes) => TxMeta::decode(&bytes).map(Some),
        }
    }

    /// Hashes of all indexed transactions touching `addr`, in key order.
    pub fn address_txs(&self, addr: &AddrHash) -> IndexResult<Vec<Hash256>> {
        let prefix = layout::addr_tx_prefix(addr);
        let keys = self.inner.store.scan_keys(
            &layout::prefix_min(&prefix),
            &layout::prefix_max(&prefix),
            false,
        )?;
        keys.iter()
            .map(|key| {
                layout::parse_addr_tx_key(key)
                    .ok_or_else(|| IndexError::Corruption(format!("bad tx edge {}", hex::encode(key))))
            })
            .collect()
    }

    /// Outpoints of all indexed unspent coins paying `addr`, in key order.
    pub fn address_coins(&self, addr: &AddrHash) -> IndexResult<Vec<Outpoint>> {
        let prefix = layout::addr_coin_prefix(addr);
        let keys = self.inner.store.scan_keys(
            &layout::prefix_min(&prefix),
            &layout::prefix_max(&prefix),
            false,
        )?;
        keys.iter()
            .map(|key| {
                layout::parse_addr_coin_key(key)
                    .ok_or_else(|| IndexError::Corruption(format!("bad coin edge {}", hex::encode(key))))
            })
            .collect()
    }
}

impl Drop for IndexDb {
    fn drop(&mut self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Write the network magic on first open, compare afterwards.
fn verify_network(store: &dyn Store, magic: u32) -> IndexResult<()> {
    use crate::records::{decode_magic, encode_magic};

    match store.get(&layout::network_key())? {
        None => {
            let mut batch = WriteBatch::new();
            batch.put(layout::network_key().to_vec(), encode_magic(magic).to_vec());
            store.write_batch(batch)?;
            Ok(())
        }
        Some(bytes) => {
            let stored = decode_magic(&bytes)?;
            if stored == magic {
                Ok(())
            } else {
                Err(IndexError::NetworkMismatch {
                    stored,
                    configured: magic,
                })
            }
        }
    }
}

/// Drain producer events into the handler on the current runtime, if any.
///
/// Without a runtime the caller delivers events through
/// [`IndexDb::notify`] directly, as the tests do.
fn spawn_pump(
    inner: &Arc<Inner>,
    mut events: mpsc::Receiver<ChainEvent>,
) -> Option<tokio::task::JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!("no async runtime; chain events must be delivered via notify()");
        return None;
    };
    let inner = Arc::clone(inner);
    Some(runtime.spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(IndexError::Closed) = inner.dispatch(event) {
                break;
            }
        }
    }))
}

impl Inner {
    fn set_status(&self, status: SyncStatus) {
        *self.status.write() = status;
    }

    fn emit(&self, err: &IndexError) {
        if let Some(tx) = &*self.errors.lock() {
            let _ = tx.send(err.clone());
        }
    }

    /// Serialize one chain event through the exclusion lock.
    fn dispatch(&self, event: ChainEvent) -> IndexResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexError::Closed);
        }

        let result = match event {
            ChainEvent::Connect { entry, block, view } => self.on_connect(&entry, &block, &view),
            ChainEvent::Disconnect { entry, block, view } => {
                self.on_disconnect(&entry, &block, &view)
            }
            ChainEvent::Reset { tip } => self.on_reset(&tip),
            ChainEvent::Transaction { tx } => {
                for indexer in &self.indexers {
                    indexer.observe_tx(&tx);
                }
                Ok(())
            }
        };

        match &result {
            Ok(()) => self.set_status(SyncStatus::Idle),
            Err(err) => {
                error!(%err, "chain event failed");
                self.emit(err);
            }
        }
        result
    }

    // ==================== Event handlers ====================

    fn on_connect(&self, entry: &ChainEntry, block: &Block, view: &CoinView) -> IndexResult<()> {
        let mut cursor = self.cursor.lock();
        let tip_height = cursor_state(&cursor)?.height;

        if entry.height == tip_height + 1 {
            if entry.prev != self.height_hash_at(tip_height)? {
                warn!(
                    height = entry.height,
                    "connecting block does not extend indexed tip; re-syncing"
                );
                return self.sync_chain(&mut cursor);
            }
            self.set_status(SyncStatus::Indexing);
            self.index_block(&mut cursor, entry, block, view)?;
            debug!(height = entry.height, hash = %entry.hash, "indexed block");
            Ok(())
        } else if entry.height == tip_height {
            if entry.hash == self.height_hash_at(tip_height)? {
                warn!(height = entry.height, "re-indexing current tip");
                self.set_status(SyncStatus::Indexing);
                self.index_block(&mut cursor, entry, block, view)
            } else {
                warn!(
                    height = entry.height,
                    "tip replaced without disconnect; re-syncing"
                );
                self.sync_chain(&mut cursor)
            }
        } else if entry.height < tip_height {
            warn!(
                height = entry.height,
                tip = tip_height,
                "connect below indexed tip; re-syncing"
            );
            self.sync_chain(&mut cursor)
        } else {
            warn!(
                height = entry.height,
                tip = tip_height,
                "gap in connect events; scanning"
            );
            self.scan(&mut cursor, tip_height)
        }
    }

    fn on_disconnect(&self, entry: &ChainEntry, block: &Block, view: &CoinView) -> IndexResult<()> {
        let mut cursor = self.cursor.lock();
        let tip_height = cursor_state(&cursor)?.height;

        if entry.height == 0 {
            return Err(IndexError::BadDisconnect("cannot disconnect genesis".into()));
        }
        if entry.height != tip_height {
            return Err(IndexError::BadDisconnect(format!(
                "disconnect at height {} but indexed tip is {}",
                entry.height, tip_height
            )));
        }
        if entry.hash != self.height_hash_at(tip_height)? {
            return Err(IndexError::BadDisconnect(format!(
                "disconnect of {} does not match indexed tip",
                entry.hash
            )));
        }
        if !view.is_complete() {
            return Err(IndexError::InvariantViolation(
                "disconnect requires a complete coin view".into(),
            ));
        }

        self.set_status(SyncStatus::RollingBack);
        let prev_hash = self.height_hash_at(entry.height - 1)?;
        self.unindex_block(&mut cursor, entry, block, view, prev_hash)?;
        debug!(height = entry.height - 1, "disconnected tip");
        Ok(())
    }

    fn on_reset(&self, tip: &ChainEntry) -> IndexResult<()> {
        let mut cursor = self.cursor.lock();
        let tip_height = cursor_state(&cursor)?.height;
        let target = tip.height.min(tip_height);

        info!(height = target, "chain reset; re-syncing");
        self.set_status(SyncStatus::RollingBack);
        self.rollback(&mut cursor, target)?;
        self.sync_chain(&mut cursor)
    }

    // ==================== Tip updates ====================

    /// Move the indexed tip to `(hash, height)` and commit `batch`.
    ///
    /// The tip may advance by exactly one block, stay (re-index of the
    /// current tip), or move backwards, in which case the height map above
    /// it is dropped in the same batch. All per-block indexer mutations for
    /// the transition must already be in `batch`: this is the commit point.
    fn set_tip(
        &self,
        cursor: &mut Cursor,
        hash: Hash256,
        height: u32,
        mut batch: WriteBatch,
    ) -> IndexResult<()> {
        let mut state = *cursor_state(cursor)?;

        if height == state.height + 1 {
            state.height = height;
        } else if height == state.height {
            // Idempotent re-index of the tip block.
        } else if height < state.height {
            for stale in (height + 1)..=state.height {
                batch.delete(layout::height_key(stale).to_vec());
            }
            state.height = height;
        } else {
            return Err(IndexError::InvariantViolation(format!(
                "tip may only advance one block: indexed {}, got {}",
                state.height, height
            )));
        }

        if height < state.start_height {
            state.start_height = height;
            state.start_hash = hash;
        }

        batch.put(
            layout::height_key(height).to_vec(),
            hash.as_bytes().to_vec(),
        );
        batch.put(layout::state_key().to_vec(), state.encode().to_vec());

        self.store.write_batch(batch)?;
        cursor.state = Some(state);
        Ok(())
    }

    /// Compose forward mutations for `block` and commit them with the tip
    /// update.
    fn index_block(
        &self,
        cursor: &mut Cursor,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
    ) -> IndexResult<()> {
        if block.hash != entry.hash {
            return Err(IndexError::InvariantViolation(format!(
                "block {} does not match entry {}",
                block.hash, entry.hash
            )));
        }

        let mut batch = WriteBatch::new();
        for indexer in &self.indexers {
            let mut guarded = IndexBatch::new(&mut batch, indexer.prefixes());
            indexer.index_block(&mut guarded, entry, block, view)?;
        }
        self.set_tip(cursor, entry.hash, entry.height, batch)
    }

    /// Compose inverse mutations for `block` and commit them with the tip
    /// decrement.
    fn unindex_block(
        &self,
        cursor: &mut Cursor,
        entry: &ChainEntry,
        block: &Block,
        view: &CoinView,
        prev_hash: Hash256,
    ) -> IndexResult<()> {
        let mut batch = WriteBatch::new();
        for indexer in &self.indexers {
            let mut guarded = IndexBatch::new(&mut batch, indexer.prefixes());
            indexer.unindex_block(&mut guarded, entry, block, view)?;
        }
        self.set_tip(cursor, prev_hash, entry.height - 1, batch)
    }

    // ==================== Sync loop ====================

    /// Adopt the persisted state, or bootstrap it from the producer.
    fn sync_state(&self, cursor: &mut Cursor) -> IndexResult<()> {
        match self.store.get(&layout::state_key())? {
            Some(bytes) => {
                let state = IndexState::decode(&bytes)?;
                if !self.store.contains(&layout::height_key(0))? {
                    self.migrate_state(&state)?;
                }
                info!(
                    height = state.height,
                    start_height = state.start_height,
                    "index state loaded"
                );
                cursor.state = Some(state);
                Ok(())
            }
            None => {
                let tip = self.client.get_tip()?;
                info!(height = tip.height, hash = %tip.hash, "bootstrapping index state");

                let hashes = self.fetch_hashes(0, tip.height)?;
                let state = IndexState {
                    start_height: tip.height,
                    start_hash: tip.hash,
                    height: tip.height,
                };
                self.write_height_map(&hashes, Some(&state))?;
                cursor.state = Some(state);
                Ok(())
            }
        }
    }

    /// Rebuild the height map for a store that predates it.
    fn migrate_state(&self, state: &IndexState) -> IndexResult<()> {
        info!(height = state.height, "rebuilding height map");
        let hashes = self.fetch_hashes(0, state.height)?;
        self.write_height_map(&hashes, None)
    }

    fn fetch_hashes(&self, start: u32, end: u32) -> IndexResult<Vec<Hash256>> {
        let hashes = self.client.get_hashes(start, end)?;
        let expected = (end - start) as usize + 1;
        if hashes.len() != expected {
            return Err(IndexError::Client(format!(
                "producer returned {} hashes for heights {}..={}",
                hashes.len(),
                start,
                end
            )));
        }
        Ok(hashes)
    }

    /// Persist `hashes` as the height map starting at zero, chunked into
    /// bounded sub-batches; `state` (if any) commits in the final one.
    fn write_height_map(&self, hashes: &[Hash256], state: Option<&IndexState>) -> IndexResult<()> {
        let mut batch = WriteBatch::new();
        for (height, hash) in hashes.iter().enumerate() {
            batch.put(
                layout::height_key(height as u32).to_vec(),
                hash.as_bytes().to_vec(),
            );
            if batch.len() >= MAX_BATCH_OPS {
                let full = std::mem::take(&mut batch);
                self.store.write_batch(full)?;
            }
        }
        if let Some(state) = state {
            batch.put(layout::state_key().to_vec(), state.encode().to_vec());
        }
        if !batch.is_empty() {
            self.store.write_batch(batch)?;
        }
        Ok(())
    }

    /// Walk back from the indexed tip to the last block the producer still
    /// recognizes, then scan forward from there.
    fn sync_chain(&self, cursor: &mut Cursor) -> IndexResult<()> {
        let tip_height = cursor_state(cursor)?.height;

        let mut height = tip_height;
        loop {
            let hash = self.height_hash_at(height)?;
            if self
                .client
                .get_entry(HashOrHeight::Hash(hash))?
                .is_some()
            {
                break;
            }
            if height == 0 {
                return Err(IndexError::InvariantViolation(
                    "producer does not recognize indexed genesis".into(),
                ));
            }
            height -= 1;
        }

        if height < tip_height {
            warn!(
                ancestor = height,
                tip = tip_height,
                "indexed chain diverges from producer"
            );
        }
        self.scan(cursor, height)
    }

    /// Roll back to `height`, then index forward block by block until the
    /// producer has no successor.
    fn scan(&self, cursor: &mut Cursor, height: u32) -> IndexResult<()> {
        info!(height, "scanning chain");
        self.set_status(SyncStatus::RollingBack);
        self.rollback(cursor, height)?;

        self.set_status(SyncStatus::Indexing);
        let base_hash = self.height_hash_at(height)?;
        let mut entry = self
            .client
            .get_entry(HashOrHeight::Hash(base_hash))?
            .ok_or_else(|| {
                IndexError::Client(format!("scan base {base_hash} not on producer best chain"))
            })?;

        let mut indexed = 0u32;
        while let Some(next) = self.client.get_next(&entry)? {
            let block = self.client.get_block(&next.hash)?;
            let view = self.client.get_spent_view(&block)?;
            self.index_block(cursor, &next, &block, &view)?;
            entry = next;
            indexed += 1;
        }

        if indexed > 0 {
            info!(from = height, to = entry.height, indexed, "chain scan complete");
        }
        Ok(())
    }

    /// Reverse-unindex from the tip down to `height`, one committed batch
    /// per block so a crash leaves a consistent prefix.
    fn rollback(&self, cursor: &mut Cursor, height: u32) -> IndexResult<()> {
        let tip_height = cursor_state(cursor)?.height;
        if height > tip_height {
            return Err(IndexError::InvariantViolation(format!(
                "cannot roll back to {} above tip {}",
                height, tip_height
            )));
        }
        if height == tip_height {
            return Ok(());
        }

        warn!(from = tip_height, to = height, "rolling back indexes");
        let mut current = tip_height;
        while current > height {
            let stale = self.height_hash_at(current)?;
            let block = self.client.get_block(&stale)?;
            let view = self.client.get_spent_view(&block)?;
            let entry = ChainEntry {
                hash: stale,
                height: current,
                time: block.time,
                prev: block.prev,
            };
            let prev_hash = self.height_hash_at(current - 1)?;
            self.unindex_block(cursor, &entry, &block, &view, prev_hash)?;
            current -= 1;
        }
        Ok(())
    }

    /// The indexed hash at `height`; missing entries are corruption.
    fn height_hash_at(&self, height: u32) -> IndexResult<Hash256> {
        let bytes = self
            .store
            .get(&layout::height_key(height))?
            .ok_or_else(|| {
                IndexError::Corruption(format!("missing height map entry at {height}"))
            })?;
        Hash256::from_slice(&bytes)
            .ok_or_else(|| IndexError::Corruption(format!("bad height map entry at {height}")))
    }
}
