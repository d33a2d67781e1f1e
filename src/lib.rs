//! Attestation protocol client and codec.
//!
//! Proves facts about source ledger transactions through an oracle network
//! and checks the resulting Merkle proofs. This crate ties the workspace
//! together:
//!
//! - [`attestor_core`] holds the scheme registry, request codec, response
//!   hashing and the Merkle engine
//! - [`attestor_client`] runs the request, finalize and fetch protocol
//! - [`config`] loads layered settings for the client
//! - [`telemetry`] installs structured logging
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use attestor::{attestor_client::SourceLedger, AttestorConfig};
//!
//! # async fn example(ledger: Arc<dyn SourceLedger>) -> anyhow::Result<()> {
//! let config = AttestorConfig::load()?;
//! attestor::telemetry::init_tracing(&config.rust_log)?;
//!
//! let prover = attestor::build_prover(&config, ledger)?;
//! let outcome = prover.prove_confirmed_block_height_exists(3600).await?;
//! println!("proved: {}", outcome.is_proved());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

pub use attestor_client;
pub use attestor_core;

pub mod config;
pub mod telemetry;

pub use attestor_client::{AttestationProver, ProofOutcome};
pub use config::AttestorConfig;

/// Prover speaking to the configured HTTP oracle provider.
///
/// # Errors
///
/// Fails if the HTTP client cannot be built from `config`.
pub fn build_prover(
    config: &AttestorConfig,
    ledger: Arc<dyn attestor_client::SourceLedger>,
) -> anyhow::Result<AttestationProver> {
    let oracle =
        attestor_client::HttpOracleClient::new(config.to_client_config(), config.to_poll_policy())?;
    Ok(AttestationProver::with_config(ledger, Arc::new(oracle), config.to_prover_config()))
}
