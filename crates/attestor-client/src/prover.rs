//! Request, finalize and fetch protocol.
//!
//! Each proof flow walks `Located -> Submitted -> RoundFinalized -> Fetched`
//! and ends in [`ProofOutcome::Proved`] or [`ProofOutcome::Failed`]. The four
//! typed operations differ only in how they locate their subject on the
//! ledger; submission, the finalization wait and the proof fetch are shared
//! by [`AttestationProver::prove`].

use std::{fmt, sync::Arc, time::Duration};

use alloy_primitives::{Bytes, B256};
use attestor_core::{
    message_integrity_code, BalanceDecreasingTransactionRequest, ConfirmedBlockHeightExistsRequest,
    Numeric, PaymentRequest, ReferencedPaymentNonexistenceRequest, Request, Response,
    DEFAULT_MIC_SALT,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    error::{ClientError, Result},
    ledger::{
        address_hash, find_address_index, Block, BlockId, SourceLedger, Transaction, UtxoEntry,
    },
    oracle::{OracleNetworkClient, RequestId},
};

/// Prover settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProverConfig {
    /// Upper bound for the finalization wait; `None` waits indefinitely.
    pub finalization_timeout: Option<Duration>,
    /// Salt for message integrity codes of anticipated responses.
    pub mic_salt: String,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self { finalization_timeout: None, mic_salt: DEFAULT_MIC_SALT.to_string() }
    }
}

/// Protocol stage of a proof flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofStage {
    /// The subject was found on the ledger.
    Located,
    /// The request was handed to the oracle network.
    Submitted,
    /// The request's round finalized.
    RoundFinalized,
    /// The proof was fetched.
    Fetched,
}

impl fmt::Display for ProofStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Located => "located",
            Self::Submitted => "submitted",
            Self::RoundFinalized => "round_finalized",
            Self::Fetched => "fetched",
        };
        f.write_str(name)
    }
}

/// Why a proof flow failed without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The oracle network did not validate the claim.
    NotProved,
}

/// A response the oracle network validated, with its Merkle proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    /// Handle returned on submission.
    pub request_id: RequestId,
    /// The submitted request.
    pub request: Request,
    /// Validated response carrying a Merkle proof.
    pub response: Response,
}

/// Terminal state of a proof flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofOutcome {
    /// The claim was validated and a proof fetched.
    Proved(Proof),
    /// The network did not validate the claim.
    Failed {
        /// Why the flow failed.
        reason: FailureReason,
        /// Stage the flow had reached.
        stage: ProofStage,
    },
}

impl ProofOutcome {
    fn not_proved(stage: ProofStage) -> Self {
        Self::Failed { reason: FailureReason::NotProved, stage }
    }

    /// Whether the flow ended in a proof.
    pub fn is_proved(&self) -> bool {
        matches!(self, Self::Proved(_))
    }

    /// The proof, if the flow succeeded.
    pub fn proof(&self) -> Option<&Proof> {
        match self {
            Self::Proved(proof) => Some(proof),
            Self::Failed { .. } => None,
        }
    }

    /// Consumes the outcome, returning the proof if the flow succeeded.
    pub fn into_proof(self) -> Option<Proof> {
        match self {
            Self::Proved(proof) => Some(proof),
            Self::Failed { .. } => None,
        }
    }
}

/// Drives proof flows against a ledger and an oracle network.
///
/// Flows share no mutable state, so one prover can run any number of them
/// concurrently. Cancelling the token aborts every pending finalization
/// wait with [`ClientError::Cancelled`].
#[derive(Clone)]
pub struct AttestationProver {
    ledger: Arc<dyn SourceLedger>,
    oracle: Arc<dyn OracleNetworkClient>,
    config: ProverConfig,
    cancellation_token: CancellationToken,
}

impl fmt::Debug for AttestationProver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationProver")
            .field("source", &self.ledger.source_id())
            .field("config", &self.config)
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .finish()
    }
}

impl AttestationProver {
    /// Creates a prover with default settings.
    pub fn new(ledger: Arc<dyn SourceLedger>, oracle: Arc<dyn OracleNetworkClient>) -> Self {
        Self::with_config(ledger, oracle, ProverConfig::default())
    }

    /// Creates a prover with explicit settings.
    pub fn with_config(
        ledger: Arc<dyn SourceLedger>,
        oracle: Arc<dyn OracleNetworkClient>,
        config: ProverConfig,
    ) -> Self {
        Self { ledger, oracle, config, cancellation_token: CancellationToken::new() }
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Token that aborts pending finalization waits when cancelled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Active settings.
    pub fn config(&self) -> &ProverConfig {
        &self.config
    }

    /// Prove that `transaction_hash` paid from `source_address` to
    /// `receiving_address`. Missing addresses select the first input or
    /// output.
    ///
    /// # Errors
    ///
    /// Returns `SubjectNotFound` if the transaction, its block, an address
    /// or the finalization block cannot be located, and oracle errors from
    /// the shared flow.
    pub async fn prove_payment(
        &self,
        transaction_hash: B256,
        source_address: Option<&str>,
        receiving_address: Option<&str>,
    ) -> Result<ProofOutcome> {
        let (transaction, block) = self.locate_transaction(transaction_hash).await?;
        let in_utxo = self.address_index(&transaction.inputs, source_address).await?;
        let utxo = self.address_index(&transaction.outputs, receiving_address).await?;

        let request = Request::new(
            self.ledger.source_id(),
            PaymentRequest {
                id: Bytes::copy_from_slice(transaction_hash.as_slice()),
                block_number: block.number.into(),
                in_utxo: index_numeric(in_utxo),
                utxo: index_numeric(utxo),
            },
        );
        self.prove(request).await
    }

    /// Prove that `transaction_hash` decreased the balance of
    /// `source_address`.
    ///
    /// # Errors
    ///
    /// As for [`prove_payment`](Self::prove_payment).
    pub async fn prove_balance_decreasing_transaction(
        &self,
        transaction_hash: B256,
        source_address: Option<&str>,
    ) -> Result<ProofOutcome> {
        let (transaction, block) = self.locate_transaction(transaction_hash).await?;
        let in_utxo = self.address_index(&transaction.inputs, source_address).await?;

        let request = Request::new(
            self.ledger.source_id(),
            BalanceDecreasingTransactionRequest {
                id: Bytes::copy_from_slice(transaction_hash.as_slice()),
                block_number: block.number.into(),
                in_utxo: index_numeric(in_utxo),
            },
        );
        self.prove(request).await
    }

    /// Prove that the newest confirmed block exists, averaging block time
    /// over `query_window` seconds.
    ///
    /// # Errors
    ///
    /// Returns `SubjectNotFound` if the ledger is shallower than its
    /// finalization depth.
    pub async fn prove_confirmed_block_height_exists(
        &self,
        query_window: u64,
    ) -> Result<ProofOutcome> {
        let height = self.ledger.get_block_height().await?;
        let confirmations = self.ledger.finalization_blocks();
        if self.ledger.get_block_at(height).await?.is_none() || height < confirmations {
            return Err(ClientError::not_found("confirmed block", height));
        }
        let block_number = height - confirmations;
        debug!(stage = %ProofStage::Located, block_number, "located confirmed block");

        let request = Request::new(
            self.ledger.source_id(),
            ConfirmedBlockHeightExistsRequest {
                block_number: block_number.into(),
                query_window: query_window.into(),
            },
        );
        self.prove(request).await
    }

    /// Prove that no payment of at least `amount` carrying
    /// `payment_reference` reached `destination_address` in blocks
    /// `start_block..=end_block` before `end_timestamp`.
    ///
    /// The window must be closed on the ledger: a confirmed block past both
    /// deadlines has to exist.
    ///
    /// # Errors
    ///
    /// Returns `OverflowBlockNotFound` if no block after the deadline exists
    /// yet and `SubjectNotFound` if it is not confirmed.
    #[allow(clippy::too_many_arguments)]
    pub async fn prove_referenced_payment_nonexistence(
        &self,
        destination_address: &str,
        payment_reference: B256,
        amount: u128,
        start_block: u64,
        end_block: u64,
        end_timestamp: u64,
    ) -> Result<ProofOutcome> {
        let overflow = self.find_overflow_block(end_block, end_timestamp).await?;
        self.ensure_finalized(overflow.number).await?;
        debug!(
            stage = %ProofStage::Located,
            overflow_block = overflow.number,
            "located overflow block"
        );

        let request = Request::new(
            self.ledger.source_id(),
            ReferencedPaymentNonexistenceRequest {
                minimal_block_number: start_block.into(),
                deadline_block_number: end_block.into(),
                deadline_timestamp: end_timestamp.into(),
                destination_address_hash: Bytes::copy_from_slice(
                    address_hash(destination_address).as_slice(),
                ),
                amount: amount.into(),
                payment_reference: Bytes::copy_from_slice(payment_reference.as_slice()),
            },
        );
        self.prove(request).await
    }

    /// Run the submit, wait and fetch sequence for a prepared request.
    ///
    /// # Errors
    ///
    /// Returns codec errors, oracle errors, `FinalizationTimeout` if the
    /// configured bound elapses and `Cancelled` if the token fires while
    /// waiting. A request the network rejects or does not prove yields
    /// `Ok(ProofOutcome::Failed { .. })`.
    pub async fn prove(&self, request: Request) -> Result<ProofOutcome> {
        let span = info_span!(
            "attestation_proof",
            attestation_type = %request.attestation_type(),
            source = %request.source_id,
        );

        async move {
            let Some(request_id) = self.oracle.submit_request(&request).await? else {
                warn!(stage = %ProofStage::Submitted, "request rejected, not proved");
                return Ok(ProofOutcome::not_proved(ProofStage::Submitted));
            };
            let round = request_id.round;
            debug!(stage = %ProofStage::Submitted, round, "request submitted");

            self.await_finalization(round).await?;
            debug!(stage = %ProofStage::RoundFinalized, round, "round finalized");

            let fetched = self.oracle.obtain_proof(round, &request_id.data).await?;
            debug!(
                stage = %ProofStage::Fetched,
                round,
                finalized = fetched.finalized,
                has_result = fetched.result.is_some(),
                "proof fetched"
            );

            match fetched.result {
                Some(response) if fetched.finalized && response.has_proof() => {
                    info!(round, "attestation proved");
                    Ok(ProofOutcome::Proved(Proof { request_id, request, response }))
                },
                _ => {
                    warn!(round, stage = %ProofStage::Fetched, "no usable proof, not proved");
                    Ok(ProofOutcome::not_proved(ProofStage::Fetched))
                },
            }
        }
        .instrument(span)
        .await
    }

    /// Like [`prove`](Self::prove), with the message integrity code set from
    /// the response the caller expects.
    ///
    /// # Errors
    ///
    /// As for [`prove`](Self::prove), plus codec errors if `anticipated`
    /// does not match the request's attestation type.
    pub async fn prove_anticipated(
        &self,
        request: Request,
        anticipated: &Response,
    ) -> Result<ProofOutcome> {
        let mic = message_integrity_code(&request, anticipated, &self.config.mic_salt)?;
        self.prove(request.with_message_integrity_code(mic)).await
    }

    async fn await_finalization(&self, round: u64) -> Result<()> {
        let wait = async {
            match self.config.finalization_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.oracle.wait_for_round_finalization(round))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(round, timeout_ms = limit.as_millis(), "finalization wait timed out");
                            Err(ClientError::FinalizationTimeout { round })
                        },
                    }
                },
                None => self.oracle.wait_for_round_finalization(round).await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation_token.cancelled() => {
                warn!(round, "finalization wait cancelled");
                Err(ClientError::Cancelled)
            },
            result = wait => result,
        }
    }

    async fn locate_transaction(&self, hash: B256) -> Result<(Transaction, BlockId)> {
        let Some(transaction) = self.ledger.get_transaction(&hash).await? else {
            return Err(self.not_found(format!("transaction {hash}")).await);
        };
        let Some(block) = self.ledger.get_transaction_block(&hash).await? else {
            return Err(self.not_found(format!("block of transaction {hash}")).await);
        };
        self.ensure_finalized(block.number).await?;

        debug!(stage = %ProofStage::Located, block_number = block.number, "located transaction");
        Ok((transaction, block))
    }

    /// The block `finalization_blocks` past `number` must exist.
    async fn ensure_finalized(&self, number: u64) -> Result<Block> {
        let target = number.saturating_add(self.ledger.finalization_blocks());
        match self.ledger.get_block_at(target).await? {
            Some(block) => Ok(block),
            None => Err(self.not_found(format!("finalization block {target}")).await),
        }
    }

    /// First block after `end_block` whose timestamp is past
    /// `end_timestamp`. A block stamped exactly at the deadline is still
    /// inside the window.
    async fn find_overflow_block(&self, end_block: u64, end_timestamp: u64) -> Result<Block> {
        let mut candidate = self.ledger.get_block_at(end_block.saturating_add(1)).await?;
        while let Some(block) = &candidate {
            if block.timestamp > end_timestamp {
                break;
            }
            candidate = self.ledger.get_block_at(block.number.saturating_add(1)).await?;
        }

        match candidate {
            Some(block) => Ok(block),
            None => Err(ClientError::OverflowBlockNotFound {
                deadline_block: end_block,
                deadline_timestamp: end_timestamp,
                chain_height: self.ledger.get_block_height().await?,
            }),
        }
    }

    /// Index of `address` among `entries`, the first entry if no address is
    /// given.
    async fn address_index(&self, entries: &[UtxoEntry], address: Option<&str>) -> Result<usize> {
        match find_address_index(entries, address, 0) {
            Some(index) => Ok(index),
            None => {
                let address = address.unwrap_or_default();
                Err(self.not_found(format!("address {address} in transaction")).await)
            },
        }
    }

    async fn not_found(&self, subject: String) -> ClientError {
        match self.ledger.get_block_height().await {
            Ok(height) => ClientError::not_found(subject, height),
            Err(e) => e,
        }
    }
}

fn index_numeric(index: usize) -> Numeric {
    Numeric::from(u64::try_from(index).unwrap_or(u64::MAX))
}
