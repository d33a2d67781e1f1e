//! Source ledger model and lookup interface.
//!
//! The prover reads blocks and transactions through [`SourceLedger`]. Both
//! UTXO and account ledgers fit the model: account transactions have exactly
//! one input and one output.

use alloy_primitives::{keccak256, B256};
use async_trait::async_trait;
use attestor_core::SourceId;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Block number and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
}

/// A ledger block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Hashes of the contained transactions.
    pub transactions: Vec<B256>,
}

impl Block {
    /// Number and hash of this block.
    pub fn id(&self) -> BlockId {
        BlockId { number: self.number, hash: self.hash }
    }
}

/// One input or output of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    /// Address, if the entry has a standard one.
    pub address: Option<String>,
    /// Amount in the ledger's smallest unit.
    pub value: u128,
}

impl UtxoEntry {
    /// Entry paying `value` to or from `address`.
    pub fn new(address: impl Into<String>, value: u128) -> Self {
        Self { address: Some(address.into()), value }
    }
}

/// Transaction outcome as seen by the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Transaction succeeded.
    #[default]
    Success = 0,
    /// Failed through the sender's fault.
    SenderFailure = 1,
    /// Failed through the receiver's fault.
    ReceiverFailure = 2,
}

impl TransactionStatus {
    /// Status code used in attestation responses.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// A ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: B256,
    /// Spent entries.
    pub inputs: Vec<UtxoEntry>,
    /// Created entries.
    pub outputs: Vec<UtxoEntry>,
    /// Payment reference, if the transaction carries one.
    pub reference: Option<B256>,
    /// Outcome.
    pub status: TransactionStatus,
}

/// Read access to a source ledger.
#[async_trait]
pub trait SourceLedger: Send + Sync {
    /// Ledger this backend serves.
    fn source_id(&self) -> SourceId;

    /// Confirmations required before a block is final.
    fn finalization_blocks(&self) -> u64;

    /// Look up a transaction by hash.
    async fn get_transaction(&self, hash: &B256) -> Result<Option<Transaction>>;

    /// Block containing a transaction.
    async fn get_transaction_block(&self, hash: &B256) -> Result<Option<BlockId>>;

    /// Block at a height.
    async fn get_block_at(&self, number: u64) -> Result<Option<Block>>;

    /// Number of the newest block.
    async fn get_block_height(&self) -> Result<u64>;
}

/// Hash of an address as it appears in attestation requests and responses.
pub fn address_hash(address: &str) -> B256 {
    keccak256(address.as_bytes())
}

/// Index of the entry belonging to `address`, or `default` when no address
/// is given.
///
/// Returns `None` if no entry has that address.
pub fn find_address_index(
    entries: &[UtxoEntry],
    address: Option<&str>,
    default: usize,
) -> Option<usize> {
    let Some(address) = address else {
        return Some(default);
    };
    entries.iter().position(|entry| entry.address.as_deref() == Some(address))
}
