//! Client side of the attestation protocol.
//!
//! An attestation is proven in three steps: the request is submitted to the
//! oracle network, the voting round it landed in finalizes, and the
//! validated response is fetched together with its Merkle proof. The
//! [`AttestationProver`] drives those steps for each attestation type,
//! locating the subject on a [`SourceLedger`] first.
//!
//! # Architecture
//!
//! 1. **Locate** - Find the transaction or block on the source ledger
//! 2. **Submit** - Hand the encoded request to the oracle network
//! 3. **Finalize** - Wait for the request's round, bounded and cancellable
//! 4. **Fetch** - Obtain the response and its Merkle proof
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use attestor_client::{
//!     AttestationProver, ClientConfig, HttpOracleClient, PollPolicy, SourceLedger,
//! };
//!
//! # async fn example(ledger: Arc<dyn SourceLedger>) -> attestor_client::Result<()> {
//! let oracle = HttpOracleClient::new(ClientConfig::default(), PollPolicy::default())?;
//! let prover = AttestationProver::new(ledger, Arc::new(oracle));
//!
//! let outcome = prover.prove_confirmed_block_height_exists(3600).await?;
//! println!("proved: {}", outcome.is_proved());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod ledger;
pub mod oracle;
pub mod poll;
pub mod prover;
pub mod time;

pub use error::{ClientError, Result};
pub use http::{ClientConfig, HttpOracleClient};
pub use ledger::{
    address_hash, find_address_index, Block, BlockId, SourceLedger, Transaction,
    TransactionStatus, UtxoEntry,
};
pub use oracle::{OracleNetworkClient, ProofResult, RequestId};
pub use poll::{BackoffStrategy, FinalizationPoller, PollPolicy};
pub use prover::{
    AttestationProver, FailureReason, Proof, ProofOutcome, ProofStage, ProverConfig,
};
pub use time::{Clock, RealClock, TestClock};

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
