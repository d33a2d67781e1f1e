//! In-memory source ledger.
//!
//! Blocks are appended with [`MockChain::mine`] and never reorganized. Each
//! block is stamped `block_time` seconds after its parent, plus any time
//! queued with [`MockChain::skip_time`].

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use alloy_primitives::{Keccak256, B256};
use async_trait::async_trait;
use attestor_client::{Block, BlockId, Result, SourceLedger, Transaction};
use attestor_core::SourceId;
use tracing::debug;

/// Timestamp of the genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Default seconds between blocks.
pub const DEFAULT_BLOCK_TIME: u64 = 10;

#[derive(Debug)]
struct ChainState {
    blocks: Vec<Block>,
    transactions: HashMap<B256, (Transaction, u64)>,
    pending_skip: u64,
}

/// Append-only in-memory ledger.
#[derive(Debug)]
pub struct MockChain {
    source_id: SourceId,
    finalization_blocks: u64,
    block_time: u64,
    state: RwLock<ChainState>,
}

impl MockChain {
    /// Chain with a genesis block at height zero.
    pub fn new(source_id: SourceId, finalization_blocks: u64) -> Self {
        Self::with_block_time(source_id, finalization_blocks, DEFAULT_BLOCK_TIME)
    }

    /// Chain producing blocks every `block_time` seconds.
    pub fn with_block_time(source_id: SourceId, finalization_blocks: u64, block_time: u64) -> Self {
        let genesis = Block {
            number: 0,
            hash: block_hash(0, GENESIS_TIMESTAMP, &[]),
            timestamp: GENESIS_TIMESTAMP,
            transactions: Vec::new(),
        };
        Self {
            source_id,
            finalization_blocks,
            block_time: block_time.max(1),
            state: RwLock::new(ChainState {
                blocks: vec![genesis],
                transactions: HashMap::new(),
                pending_skip: 0,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a block holding `transactions`.
    pub fn mine(&self, transactions: Vec<Transaction>) -> Block {
        let mut state = self.write();
        let parent = state.blocks.last().map_or(GENESIS_TIMESTAMP, |b| b.timestamp);
        let number = u64::try_from(state.blocks.len()).unwrap_or(u64::MAX);
        let timestamp = parent + self.block_time + std::mem::take(&mut state.pending_skip);

        let hashes: Vec<B256> = transactions.iter().map(|tx| tx.hash).collect();
        let block = Block {
            number,
            hash: block_hash(number, timestamp, &hashes),
            timestamp,
            transactions: hashes,
        };
        for tx in transactions {
            state.transactions.insert(tx.hash, (tx, number));
        }
        state.blocks.push(block.clone());

        debug!(number, timestamp, transactions = block.transactions.len(), "mined block");
        block
    }

    /// Append `count` empty blocks, returning the new height.
    pub fn mine_empty(&self, count: u64) -> u64 {
        for _ in 0..count {
            self.mine(Vec::new());
        }
        self.height()
    }

    /// Delay the next block by an extra `seconds`.
    pub fn skip_time(&self, seconds: u64) {
        let mut state = self.write();
        state.pending_skip = state.pending_skip.saturating_add(seconds);
    }

    /// Number of the newest block.
    pub fn height(&self) -> u64 {
        self.read().blocks.last().map_or(0, |b| b.number)
    }

    /// Block at `number`, if mined.
    pub fn block(&self, number: u64) -> Option<Block> {
        let index = usize::try_from(number).ok()?;
        self.read().blocks.get(index).cloned()
    }

    /// Blocks `from..=to` that have been mined.
    pub fn blocks_between(&self, from: u64, to: u64) -> Vec<Block> {
        let state = self.read();
        state.blocks.iter().filter(|b| b.number >= from && b.number <= to).cloned().collect()
    }

    /// Transaction and the number of its block.
    pub fn transaction(&self, hash: &B256) -> Option<(Transaction, u64)> {
        self.read().transactions.get(hash).cloned()
    }

    /// Whether `number` has `finalization_blocks` blocks on top of it.
    pub fn is_confirmed(&self, number: u64) -> bool {
        number.saturating_add(self.finalization_blocks) <= self.height()
    }

    /// Ledger this chain pretends to be.
    pub fn source(&self) -> SourceId {
        self.source_id
    }

    /// Confirmation depth.
    pub fn confirmations(&self) -> u64 {
        self.finalization_blocks
    }
}

#[async_trait]
impl SourceLedger for MockChain {
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    fn finalization_blocks(&self) -> u64 {
        self.finalization_blocks
    }

    async fn get_transaction(&self, hash: &B256) -> Result<Option<Transaction>> {
        Ok(self.transaction(hash).map(|(tx, _)| tx))
    }

    async fn get_transaction_block(&self, hash: &B256) -> Result<Option<BlockId>> {
        let Some((_, number)) = self.transaction(hash) else {
            return Ok(None);
        };
        Ok(self.block(number).map(|b| b.id()))
    }

    async fn get_block_at(&self, number: u64) -> Result<Option<Block>> {
        Ok(self.block(number))
    }

    async fn get_block_height(&self) -> Result<u64> {
        Ok(self.height())
    }
}

fn block_hash(number: u64, timestamp: u64, transactions: &[B256]) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(number.to_be_bytes());
    hasher.update(timestamp.to_be_bytes());
    for tx in transactions {
        hasher.update(tx);
    }
    hasher.finalize()
}
