//! Builders for transactions, requests and anticipated responses.

use alloy_primitives::{Bytes, B256};
use attestor_client::{Transaction, TransactionStatus, UtxoEntry};
use attestor_core::{
    ConfirmedBlockHeightExistsRequest, PaymentRequest, ReferencedPaymentNonexistenceRequest,
    Request, SourceId,
};
use rand::Rng;

/// Builder for ledger transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    hash: Option<B256>,
    inputs: Vec<UtxoEntry>,
    outputs: Vec<UtxoEntry>,
    reference: Option<B256>,
    status: TransactionStatus,
}

impl TransactionBuilder {
    /// Creates an empty, successful transaction with a random hash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixes the transaction hash.
    #[must_use]
    pub fn hash(mut self, hash: B256) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Adds an input spending `value` from `address`.
    #[must_use]
    pub fn input(mut self, address: &str, value: u128) -> Self {
        self.inputs.push(UtxoEntry::new(address, value));
        self
    }

    /// Adds an output paying `value` to `address`.
    #[must_use]
    pub fn output(mut self, address: &str, value: u128) -> Self {
        self.outputs.push(UtxoEntry::new(address, value));
        self
    }

    /// Adds an output without a standard address.
    #[must_use]
    pub fn script_output(mut self, value: u128) -> Self {
        self.outputs.push(UtxoEntry { address: None, value });
        self
    }

    /// Sets the payment reference.
    #[must_use]
    pub fn reference(mut self, reference: B256) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets the outcome.
    #[must_use]
    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    /// Builds the transaction.
    pub fn build(self) -> Transaction {
        Transaction {
            hash: self.hash.unwrap_or_else(random_hash),
            inputs: self.inputs,
            outputs: self.outputs,
            reference: self.reference,
            status: self.status,
        }
    }
}

/// Random 32-byte hash.
pub fn random_hash() -> B256 {
    B256::from(rand::rng().random::<[u8; 32]>())
}

/// Payment request for a transaction at `block_number`.
pub fn payment_request(
    source_id: SourceId,
    transaction_hash: B256,
    block_number: u64,
    in_utxo: u8,
    utxo: u8,
) -> Request {
    Request::new(source_id, PaymentRequest {
        id: Bytes::copy_from_slice(transaction_hash.as_slice()),
        block_number: block_number.into(),
        in_utxo: in_utxo.into(),
        utxo: utxo.into(),
    })
}

/// Block height request for `block_number`.
pub fn block_height_request(source_id: SourceId, block_number: u64, query_window: u64) -> Request {
    Request::new(source_id, ConfirmedBlockHeightExistsRequest {
        block_number: block_number.into(),
        query_window: query_window.into(),
    })
}

/// Nonexistence request over `minimal_block..=deadline_block`.
pub fn nonexistence_request(
    source_id: SourceId,
    destination_address_hash: B256,
    payment_reference: B256,
    amount: u128,
    minimal_block: u64,
    deadline_block: u64,
    deadline_timestamp: u64,
) -> Request {
    Request::new(source_id, ReferencedPaymentNonexistenceRequest {
        minimal_block_number: minimal_block.into(),
        deadline_block_number: deadline_block.into(),
        deadline_timestamp: deadline_timestamp.into(),
        destination_address_hash: Bytes::copy_from_slice(destination_address_hash.as_slice()),
        amount: amount.into(),
        payment_reference: Bytes::copy_from_slice(payment_reference.as_slice()),
    })
}
