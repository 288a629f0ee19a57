//! Test harness: an in-memory chain producer.
//!
//! `TestChain` stands in for the primary chain database. It can extend,
//! pop, and reset its best chain, hands out connect/disconnect events for
//! the engine to consume, and keeps serving orphaned blocks by hash the way
//! a real block store does.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use vigil_chain::{
    AddrHash, Block, ChainEntry, Coin, CoinView, Hash256, Input, Outpoint, Output, Transaction,
};
use vigil_index::{
    ChainClient, ChainEvent, HashOrHeight, IndexError, IndexResult, EVENT_QUEUE_DEPTH,
};

struct ChainState {
    /// Best chain, indexed by height.
    entries: Vec<ChainEntry>,
    /// Every block ever produced, including orphans.
    blocks: HashMap<Hash256, Block>,
    /// Spent-output view per block.
    views: HashMap<Hash256, CoinView>,
    /// Every output ever created.
    coins: HashMap<Outpoint, Coin>,
}

pub struct TestChain {
    inner: Mutex<ChainState>,
    subscribers: Mutex<Vec<mpsc::Sender<ChainEvent>>>,
}

impl TestChain {
    pub fn new() -> Arc<Self> {
        let genesis_hash = Hash256::digest(b"genesis");
        let genesis = ChainEntry {
            hash: genesis_hash,
            height: 0,
            time: 1_600_000_000,
            prev: Hash256::ZERO,
        };
        let block = Block {
            hash: genesis_hash,
            prev: Hash256::ZERO,
            time: genesis.time,
            txs: Vec::new(),
        };

        let mut blocks = HashMap::new();
        blocks.insert(genesis_hash, block);
        let mut views = HashMap::new();
        views.insert(genesis_hash, CoinView::new());

        Arc::new(Self {
            inner: Mutex::new(ChainState {
                entries: vec![genesis],
                blocks,
                views,
                coins: HashMap::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Deliver an event over the subscription channel, as a live producer
    /// would.
    pub async fn emit(&self, event: ChainEvent) {
        let senders = self.subscribers.lock().clone();
        for sender in senders {
            let _ = sender.send(event.clone()).await;
        }
    }

    pub fn client(self: &Arc<Self>) -> Arc<dyn ChainClient> {
        Arc::clone(self) as Arc<dyn ChainClient>
    }

    pub fn tip(&self) -> ChainEntry {
        *self.inner.lock().entries.last().unwrap()
    }

    pub fn hash_at(&self, height: u32) -> Hash256 {
        self.inner.lock().entries[height as usize].hash
    }

    /// A coinbase paying `value` to `to`.
    pub fn coinbase(seed: &str, value: u64, to: AddrHash) -> Transaction {
        Transaction {
            hash: Hash256::digest(seed.as_bytes()),
            raw: seed.as_bytes().to_vec(),
            inputs: vec![Input::coinbase()],
            outputs: vec![Output::new(value, to)],
        }
    }

    /// A transaction spending `funding`'s output `vout` into `outputs`.
    pub fn spend(seed: &str, funding: &Transaction, vout: u32, outputs: Vec<Output>) -> Transaction {
        Transaction {
            hash: Hash256::digest(seed.as_bytes()),
            raw: seed.as_bytes().to_vec(),
            inputs: vec![Input::new(Outpoint::new(funding.hash, vout))],
            outputs,
        }
    }

    /// Extend the best chain with a block holding `txs`; returns the connect
    /// event a producer would emit for it.
    pub fn connect(&self, seed: &str, txs: Vec<Transaction>) -> ChainEvent {
        let mut inner = self.inner.lock();
        let parent = *inner.entries.last().unwrap();

        let hash = Hash256::digest(seed.as_bytes());
        let height = parent.height + 1;
        let time = 1_600_000_000 + height * 600;

        let mut view = CoinView::new();
        for tx in &txs {
            if tx.is_coinbase() {
                continue;
            }
            for input in &tx.inputs {
                let coin = *inner
                    .coins
                    .get(&input.prevout)
                    .expect("test transaction spends an unknown coin");
                view.insert(input.prevout, coin);
            }
        }
        for tx in &txs {
            for (index, output) in tx.outputs.iter().enumerate() {
                inner.coins.insert(
                    Outpoint::new(tx.hash, index as u32),
                    Coin {
                        value: output.value,
                        address: output.address,
                    },
                );
            }
        }

        let entry = ChainEntry {
            hash,
            height,
            time,
            prev: parent.hash,
        };
        let block = Block {
            hash,
            prev: parent.hash,
            time,
            txs,
        };

        inner.entries.push(entry);
        inner.blocks.insert(hash, block.clone());
        inner.views.insert(hash, view.clone());

        ChainEvent::Connect { entry, block, view }
    }

    /// Pop the best-chain tip; returns the disconnect event a producer would
    /// emit for it. The block stays retrievable by hash.
    pub fn disconnect(&self) -> ChainEvent {
        let mut inner = self.inner.lock();
        assert!(inner.entries.len() > 1, "cannot pop genesis");
        let entry = inner.entries.pop().unwrap();
        let block = inner.blocks[&entry.hash].clone();
        let view = inner.views[&entry.hash].clone();
        ChainEvent::Disconnect { entry, block, view }
    }

    /// Discard the best chain down to `height`; returns the reset event.
    pub fn reset_to(&self, height: u32) -> ChainEvent {
        let mut inner = self.inner.lock();
        inner.entries.truncate(height as usize + 1);
        ChainEvent::Reset {
            tip: *inner.entries.last().unwrap(),
        }
    }

    /// A disconnect event for the genesis block, without touching the chain.
    /// No sane producer emits this; the engine must refuse it.
    pub fn genesis_disconnect(&self) -> ChainEvent {
        let inner = self.inner.lock();
        let entry = inner.entries[0];
        ChainEvent::Disconnect {
            entry,
            block: inner.blocks[&entry.hash].clone(),
            view: CoinView::new(),
        }
    }
}

impl ChainClient for TestChain {
    fn subscribe(&self) -> mpsc::Receiver<ChainEvent> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        self.subscribers.lock().push(tx);
        rx
    }

    fn get_entry(&self, query: HashOrHeight) -> IndexResult<Option<ChainEntry>> {
        let inner = self.inner.lock();
        Ok(match query {
            HashOrHeight::Hash(hash) => inner.entries.iter().find(|e| e.hash == hash).copied(),
            HashOrHeight::Height(height) => inner.entries.get(height as usize).copied(),
        })
    }

    fn get_block(&self, hash: &Hash256) -> IndexResult<Block> {
        self.inner
            .lock()
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| IndexError::Client(format!("unknown block {hash}")))
    }

    fn get_next(&self, entry: &ChainEntry) -> IndexResult<Option<ChainEntry>> {
        let inner = self.inner.lock();
        Ok(match inner.entries.get(entry.height as usize) {
            Some(at_height) if at_height.hash == entry.hash => {
                inner.entries.get(entry.height as usize + 1).copied()
            }
            _ => None,
        })
    }

    fn get_hashes(&self, start: u32, end: u32) -> IndexResult<Vec<Hash256>> {
        let inner = self.inner.lock();
        if end as usize >= inner.entries.len() {
            return Err(IndexError::Client(format!("no block at height {end}")));
        }
        Ok(inner.entries[start as usize..=end as usize]
            .iter()
            .map(|e| e.hash)
            .collect())
    }

    fn get_tip(&self) -> IndexResult<ChainEntry> {
        Ok(*self.inner.lock().entries.last().unwrap())
    }

    fn get_spent_view(&self, block: &Block) -> IndexResult<CoinView> {
        self.inner
            .lock()
            .views
            .get(&block.hash)
            .cloned()
            .ok_or_else(|| IndexError::Client(format!("no view for block {}", block.hash)))
    }
}
