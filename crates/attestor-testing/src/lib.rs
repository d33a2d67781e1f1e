//! Test doubles for attestation flows.
//!
//! Provides an in-memory source ledger, an in-memory oracle network that
//! validates requests against it and publishes per-round Merkle roots, and
//! fixture builders. Everything is deterministic apart from random
//! transaction hashes.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use attestor_client::{AttestationProver, ProverConfig};
use attestor_core::SourceId;

pub mod chain;
pub mod fixtures;
pub mod oracle;
pub mod verifier;

pub use chain::{MockChain, DEFAULT_BLOCK_TIME, GENESIS_TIMESTAMP};
pub use fixtures::{random_hash, TransactionBuilder};
pub use oracle::{FinalizationMode, MockOracleNetwork, FIRST_ROUND};
pub use verifier::expected_response;

/// Chain, oracle network and a prover wired to both.
#[derive(Debug)]
pub struct TestEnv {
    /// Source ledger.
    pub chain: Arc<MockChain>,
    /// Oracle network validating against `chain`.
    pub oracle: Arc<MockOracleNetwork>,
    /// Prover over `chain` and `oracle`.
    pub prover: AttestationProver,
}

impl TestEnv {
    /// Environment with default prover settings.
    pub fn new(source_id: SourceId, finalization_blocks: u64, mode: FinalizationMode) -> Self {
        Self::with_config(source_id, finalization_blocks, mode, ProverConfig::default())
    }

    /// Environment with explicit prover settings.
    pub fn with_config(
        source_id: SourceId,
        finalization_blocks: u64,
        mode: FinalizationMode,
        config: ProverConfig,
    ) -> Self {
        let chain = Arc::new(MockChain::new(source_id, finalization_blocks));
        let oracle = Arc::new(
            MockOracleNetwork::new(Arc::clone(&chain), mode).with_mic_salt(config.mic_salt.clone()),
        );
        let prover = AttestationProver::with_config(chain.clone(), oracle.clone(), config);
        Self { chain, oracle, prover }
    }
}
