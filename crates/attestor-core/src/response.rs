//! Attestation responses and their hash preimages.
//!
//! A response is what the oracle network validated for a request. Its hash
//! preimage is the ABI encoding of
//! `(attestationType, sourceId, stateConnectorRound, <type fields>[, salt])`,
//! matching what on-chain verifiers hash.

use alloy_primitives::{B256, I256, U128, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::types::{AttestationType, SourceId};

mod preimage {
    use alloy_sol_types::sol;

    sol! {
        struct PaymentHashPreimage {
            uint16 attestationType;
            uint32 sourceId;
            uint256 stateConnectorRound;
            uint64 blockNumber;
            uint64 blockTimestamp;
            bytes32 transactionHash;
            uint8 inUtxo;
            uint8 utxo;
            bytes32 sourceAddressHash;
            bytes32 receivingAddressHash;
            int256 spentAmount;
            int256 receivedAmount;
            bytes32 paymentReference;
            bool oneToOne;
            uint8 status;
        }

        struct BalanceDecreasingTransactionHashPreimage {
            uint16 attestationType;
            uint32 sourceId;
            uint256 stateConnectorRound;
            uint64 blockNumber;
            uint64 blockTimestamp;
            bytes32 transactionHash;
            uint8 inUtxo;
            bytes32 sourceAddressHash;
            int256 spentAmount;
            bytes32 paymentReference;
        }

        struct ConfirmedBlockHeightExistsHashPreimage {
            uint16 attestationType;
            uint32 sourceId;
            uint256 stateConnectorRound;
            uint64 blockNumber;
            uint64 blockTimestamp;
            uint8 numberOfConfirmations;
            uint64 averageBlockProductionTimeMs;
            uint64 lowestQueryWindowBlockNumber;
            uint64 lowestQueryWindowBlockTimestamp;
        }

        struct ReferencedPaymentNonexistenceHashPreimage {
            uint16 attestationType;
            uint32 sourceId;
            uint256 stateConnectorRound;
            uint64 deadlineBlockNumber;
            uint64 deadlineTimestamp;
            bytes32 destinationAddressHash;
            bytes32 paymentReference;
            uint128 amount;
            uint64 lowerBoundaryBlockNumber;
            uint64 lowerBoundaryBlockTimestamp;
            uint64 firstOverflowBlockNumber;
            uint64 firstOverflowBlockTimestamp;
        }
    }
}

use preimage::{
    BalanceDecreasingTransactionHashPreimage, ConfirmedBlockHeightExistsHashPreimage,
    PaymentHashPreimage, ReferencedPaymentNonexistenceHashPreimage,
};

/// A validated (or anticipated) attestation result.
///
/// `merkle_proof` is `None` until the proof has been fetched for a finalized
/// round; such a response is pending and proves nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Voting round in which the response was validated.
    #[serde(default)]
    pub state_connector_round: Option<u64>,
    /// Sibling hashes proving inclusion in the round's Merkle root.
    #[serde(default)]
    pub merkle_proof: Option<Vec<B256>>,
    /// Type-specific result.
    #[serde(flatten)]
    pub body: ResponseBody,
}

/// Type-specific response fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attestationType")]
pub enum ResponseBody {
    /// Payment result.
    Payment(PaymentResponse),
    /// Balance decreasing transaction result.
    BalanceDecreasingTransaction(BalanceDecreasingTransactionResponse),
    /// Confirmed block height result.
    ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsResponse),
    /// Referenced payment nonexistence result.
    ReferencedPaymentNonexistence(ReferencedPaymentNonexistenceResponse),
}

/// Result of a payment attestation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Number of the block.
    pub block_number: u64,
    /// Timestamp of the block.
    pub block_timestamp: u64,
    /// Hash of the transaction.
    pub transaction_hash: B256,
    /// Index of the source input.
    pub in_utxo: u8,
    /// Index of the receiving output.
    pub utxo: u8,
    /// Hash of the source address.
    pub source_address_hash: B256,
    /// Hash of the receiving address.
    pub receiving_address_hash: B256,
    /// Amount that left the source address.
    pub spent_amount: I256,
    /// Amount that reached the receiving address.
    pub received_amount: I256,
    /// Payment reference, zero if absent.
    pub payment_reference: B256,
    /// Single source and single receiver.
    pub one_to_one: bool,
    /// Transaction status code.
    pub status: u8,
}

/// Result of a balance decreasing transaction attestation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDecreasingTransactionResponse {
    /// Number of the block.
    pub block_number: u64,
    /// Timestamp of the block.
    pub block_timestamp: u64,
    /// Hash of the transaction.
    pub transaction_hash: B256,
    /// Index of the source input.
    pub in_utxo: u8,
    /// Hash of the source address.
    pub source_address_hash: B256,
    /// Amount that left the source address.
    pub spent_amount: I256,
    /// Payment reference, zero if absent.
    pub payment_reference: B256,
}

/// Result of a confirmed block height attestation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedBlockHeightExistsResponse {
    /// Number of the block.
    pub block_number: u64,
    /// Timestamp of the block.
    pub block_timestamp: u64,
    /// Confirmation depth of the ledger.
    pub number_of_confirmations: u8,
    /// Average block time over the query window.
    pub average_block_production_time_ms: u64,
    /// First block inside the query window.
    pub lowest_query_window_block_number: u64,
    /// Timestamp of that block.
    pub lowest_query_window_block_timestamp: u64,
}

/// Result of a referenced payment nonexistence attestation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedPaymentNonexistenceResponse {
    /// Last block of the search window.
    pub deadline_block_number: u64,
    /// Last timestamp of the search window.
    pub deadline_timestamp: u64,
    /// Hash of the destination address.
    pub destination_address_hash: B256,
    /// Payment reference, zero if absent.
    pub payment_reference: B256,
    /// Minimal amount the payment had to carry.
    pub amount: U128,
    /// First block of the search window.
    pub lower_boundary_block_number: u64,
    /// Timestamp of that block.
    pub lower_boundary_block_timestamp: u64,
    /// First block past the deadline.
    pub first_overflow_block_number: u64,
    /// Timestamp of that block.
    pub first_overflow_block_timestamp: u64,
}

impl Response {
    /// A pending response without round or proof.
    pub fn new(body: impl Into<ResponseBody>) -> Self {
        Self { state_connector_round: None, merkle_proof: None, body: body.into() }
    }

    /// Set the validating round.
    #[must_use]
    pub fn with_round(mut self, round: u64) -> Self {
        self.state_connector_round = Some(round);
        self
    }

    /// Attach a Merkle proof.
    #[must_use]
    pub fn with_merkle_proof(mut self, proof: Vec<B256>) -> Self {
        self.merkle_proof = Some(proof);
        self
    }

    /// Attestation type, derived from the body variant.
    pub fn attestation_type(&self) -> AttestationType {
        self.body.attestation_type()
    }

    /// Whether the response carries a Merkle proof.
    pub fn has_proof(&self) -> bool {
        self.merkle_proof.is_some()
    }
}

impl ResponseBody {
    /// Attestation type of this body.
    pub fn attestation_type(&self) -> AttestationType {
        match self {
            Self::Payment(_) => AttestationType::Payment,
            Self::BalanceDecreasingTransaction(_) => AttestationType::BalanceDecreasingTransaction,
            Self::ConfirmedBlockHeightExists(_) => AttestationType::ConfirmedBlockHeightExists,
            Self::ReferencedPaymentNonexistence(_) => {
                AttestationType::ReferencedPaymentNonexistence
            },
        }
    }

    /// ABI-encode the hash preimage for this body.
    ///
    /// Without a salt the encoding is the static tuple of all fields; with a
    /// salt the string is appended as a trailing dynamic parameter.
    pub(crate) fn hash_preimage(
        &self,
        attestation_type: AttestationType,
        source_id: SourceId,
        round: u64,
        salt: Option<&str>,
    ) -> Vec<u8> {
        let attestation_type = attestation_type.id();
        let source_id = source_id.id();
        let round = U256::from(round);

        macro_rules! encode {
            ($preimage:expr) => {
                match salt {
                    Some(salt) => ($preimage, salt.to_string()).abi_encode_params(),
                    None => $preimage.abi_encode(),
                }
            };
        }

        match self {
            Self::Payment(r) => encode!(PaymentHashPreimage {
                attestationType: attestation_type,
                sourceId: source_id,
                stateConnectorRound: round,
                blockNumber: r.block_number,
                blockTimestamp: r.block_timestamp,
                transactionHash: r.transaction_hash,
                inUtxo: r.in_utxo,
                utxo: r.utxo,
                sourceAddressHash: r.source_address_hash,
                receivingAddressHash: r.receiving_address_hash,
                spentAmount: r.spent_amount,
                receivedAmount: r.received_amount,
                paymentReference: r.payment_reference,
                oneToOne: r.one_to_one,
                status: r.status,
            }),
            Self::BalanceDecreasingTransaction(r) => {
                encode!(BalanceDecreasingTransactionHashPreimage {
                    attestationType: attestation_type,
                    sourceId: source_id,
                    stateConnectorRound: round,
                    blockNumber: r.block_number,
                    blockTimestamp: r.block_timestamp,
                    transactionHash: r.transaction_hash,
                    inUtxo: r.in_utxo,
                    sourceAddressHash: r.source_address_hash,
                    spentAmount: r.spent_amount,
                    paymentReference: r.payment_reference,
                })
            },
            Self::ConfirmedBlockHeightExists(r) => encode!(ConfirmedBlockHeightExistsHashPreimage {
                attestationType: attestation_type,
                sourceId: source_id,
                stateConnectorRound: round,
                blockNumber: r.block_number,
                blockTimestamp: r.block_timestamp,
                numberOfConfirmations: r.number_of_confirmations,
                averageBlockProductionTimeMs: r.average_block_production_time_ms,
                lowestQueryWindowBlockNumber: r.lowest_query_window_block_number,
                lowestQueryWindowBlockTimestamp: r.lowest_query_window_block_timestamp,
            }),
            Self::ReferencedPaymentNonexistence(r) => {
                encode!(ReferencedPaymentNonexistenceHashPreimage {
                    attestationType: attestation_type,
                    sourceId: source_id,
                    stateConnectorRound: round,
                    deadlineBlockNumber: r.deadline_block_number,
                    deadlineTimestamp: r.deadline_timestamp,
                    destinationAddressHash: r.destination_address_hash,
                    paymentReference: r.payment_reference,
                    amount: r.amount.to::<u128>(),
                    lowerBoundaryBlockNumber: r.lower_boundary_block_number,
                    lowerBoundaryBlockTimestamp: r.lower_boundary_block_timestamp,
                    firstOverflowBlockNumber: r.first_overflow_block_number,
                    firstOverflowBlockTimestamp: r.first_overflow_block_timestamp,
                })
            },
        }
    }
}

impl From<PaymentResponse> for ResponseBody {
    fn from(value: PaymentResponse) -> Self {
        Self::Payment(value)
    }
}

impl From<BalanceDecreasingTransactionResponse> for ResponseBody {
    fn from(value: BalanceDecreasingTransactionResponse) -> Self {
        Self::BalanceDecreasingTransaction(value)
    }
}

impl From<ConfirmedBlockHeightExistsResponse> for ResponseBody {
    fn from(value: ConfirmedBlockHeightExistsResponse) -> Self {
        Self::ConfirmedBlockHeightExists(value)
    }
}

impl From<ReferencedPaymentNonexistenceResponse> for ResponseBody {
    fn from(value: ReferencedPaymentNonexistenceResponse) -> Self {
        Self::ReferencedPaymentNonexistence(value)
    }
}
