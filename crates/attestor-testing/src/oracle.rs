//! In-memory oracle network.
//!
//! Requests are filed into the current round. Finalizing a round validates
//! each of its requests against a [`MockChain`], hashes the valid responses
//! into a Merkle tree and publishes the root. In [`FinalizationMode::Auto`]
//! every submission finalizes its round immediately.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use attestor_client::{ClientError, OracleNetworkClient, ProofResult, RequestId, Result};
use attestor_core::{
    decode_request, encode_request, message_integrity_code, response_hash, MerkleTree, Request,
    Response, DEFAULT_MIC_SALT,
};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::{chain::MockChain, verifier::expected_response};

/// First round handed out by a fresh network.
pub const FIRST_ROUND: u64 = 1;

/// When rounds finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizationMode {
    /// Each submission finalizes its round right away.
    Auto,
    /// Rounds finalize only through [`MockOracleNetwork::finalize_round`].
    Manual,
}

#[derive(Debug, Default)]
struct Round {
    requests: Vec<Bytes>,
    finalized: Option<FinalizedRound>,
}

#[derive(Debug)]
struct FinalizedRound {
    root: Option<B256>,
    responses: HashMap<Bytes, Response>,
}

#[derive(Debug)]
struct OracleState {
    current_round: u64,
    rounds: BTreeMap<u64, Round>,
}

/// Oracle network double validating requests against a [`MockChain`].
#[derive(Debug)]
pub struct MockOracleNetwork {
    chain: Arc<MockChain>,
    mode: FinalizationMode,
    mic_salt: String,
    state: Mutex<OracleState>,
    finalized: watch::Sender<u64>,
    reject_submissions: AtomicBool,
    withhold_proofs: AtomicBool,
    submissions: AtomicU64,
}

impl MockOracleNetwork {
    /// Network validating against `chain`.
    pub fn new(chain: Arc<MockChain>, mode: FinalizationMode) -> Self {
        let (finalized, _) = watch::channel(0);
        Self {
            chain,
            mode,
            mic_salt: DEFAULT_MIC_SALT.to_string(),
            state: Mutex::new(OracleState { current_round: FIRST_ROUND, rounds: BTreeMap::new() }),
            finalized,
            reject_submissions: AtomicBool::new(false),
            withhold_proofs: AtomicBool::new(false),
            submissions: AtomicU64::new(0),
        }
    }

    /// Checks message integrity codes with `salt`.
    #[must_use]
    pub fn with_mic_salt(mut self, salt: impl Into<String>) -> Self {
        self.mic_salt = salt.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, OracleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reject every submission from now on.
    pub fn reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    /// Serve responses without Merkle proofs from now on.
    pub fn withhold_proofs(&self, withhold: bool) {
        self.withhold_proofs.store(withhold, Ordering::SeqCst);
    }

    /// Round new submissions are filed into.
    pub fn current_round(&self) -> u64 {
        self.lock().current_round
    }

    /// Number of accepted submissions.
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Whether `round` has finalized.
    pub fn is_finalized(&self, round: u64) -> bool {
        self.lock().rounds.get(&round).is_some_and(|r| r.finalized.is_some())
    }

    /// Published Merkle root of a finalized round with at least one valid
    /// response.
    pub fn merkle_root(&self, round: u64) -> Option<B256> {
        self.lock().rounds.get(&round)?.finalized.as_ref()?.root
    }

    /// Validated response for a request of a finalized round.
    pub fn response(&self, round: u64, request_data: &Bytes) -> Option<Response> {
        self.lock().rounds.get(&round)?.finalized.as_ref()?.responses.get(request_data).cloned()
    }

    /// Finalize the current round and open the next one.
    ///
    /// Returns the number of the finalized round.
    pub fn finalize_round(&self) -> u64 {
        let mut state = self.lock();
        let round = state.current_round;
        let requests = state.rounds.entry(round).or_default().requests.clone();

        let mut valid = Vec::new();
        for data in requests {
            if let Some((response, leaf)) = self.validate(round, &data) {
                valid.push((data, response, leaf));
            }
        }

        let tree = MerkleTree::build(valid.iter().map(|(_, _, leaf)| *leaf));
        let responses = valid
            .into_iter()
            .map(|(data, response, leaf)| {
                let proof = tree.proof_for_leaf(&leaf).unwrap_or_default();
                (data, response.with_merkle_proof(proof))
            })
            .collect::<HashMap<_, _>>();

        info!(round, valid = responses.len(), root = ?tree.root(), "round finalized");
        state.rounds.entry(round).or_default().finalized =
            Some(FinalizedRound { root: tree.root(), responses });
        state.current_round = round + 1;
        drop(state);

        self.finalized.send_modify(|last| *last = round);
        round
    }

    /// Response and its leaf hash, if the request holds on the chain.
    fn validate(&self, round: u64, data: &Bytes) -> Option<(Response, B256)> {
        let request = decode_request(data).ok()?;
        let Some(response) = expected_response(&self.chain, &request) else {
            debug!(round, attestation_type = %request.attestation_type(), "request does not hold");
            return None;
        };
        if !self.integrity_matches(&request, &response) {
            debug!(round, "message integrity code mismatch");
            return None;
        }

        let response = response.with_round(round);
        let leaf = response_hash(&request, &response, None).ok()?.complete()?;
        Some((response, leaf))
    }

    fn integrity_matches(&self, request: &Request, response: &Response) -> bool {
        if request.message_integrity_code.is_zero() {
            return true;
        }
        message_integrity_code(request, response, &self.mic_salt)
            .is_ok_and(|mic| mic == request.message_integrity_code)
    }
}

#[async_trait]
impl OracleNetworkClient for MockOracleNetwork {
    async fn submit_request(&self, request: &Request) -> Result<Option<RequestId>> {
        let data = encode_request(request)?;
        if self.reject_submissions.load(Ordering::SeqCst) {
            debug!("rejecting submission");
            return Ok(None);
        }

        let round = {
            let mut state = self.lock();
            let round = state.current_round;
            state.rounds.entry(round).or_default().requests.push(data.clone());
            round
        };
        self.submissions.fetch_add(1, Ordering::SeqCst);
        debug!(round, "request filed");

        if self.mode == FinalizationMode::Auto {
            self.finalize_round();
        }
        Ok(Some(RequestId { round, data }))
    }

    async fn round_finalized(&self, round: u64) -> Result<bool> {
        Ok(self.is_finalized(round))
    }

    async fn wait_for_round_finalization(&self, round: u64) -> Result<()> {
        let mut finalized = self.finalized.subscribe();
        loop {
            if self.is_finalized(round) {
                return Ok(());
            }
            finalized
                .changed()
                .await
                .map_err(|_| ClientError::unavailable("oracle network shut down"))?;
        }
    }

    async fn obtain_proof(&self, round: u64, request_data: &Bytes) -> Result<ProofResult> {
        if !self.is_finalized(round) {
            return Ok(ProofResult::pending());
        }
        let mut result = self.response(round, request_data);
        if self.withhold_proofs.load(Ordering::SeqCst) {
            if let Some(response) = result.as_mut() {
                response.merkle_proof = None;
            }
        }
        Ok(ProofResult { finalized: true, result })
    }
}
