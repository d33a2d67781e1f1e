//! Oracle network interface.

use alloy_primitives::Bytes;
use async_trait::async_trait;
use attestor_core::{Request, Response};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Handle for a submitted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestId {
    /// Voting round the request was filed into.
    pub round: u64,
    /// Encoded request bytes.
    pub data: Bytes,
}

/// Reply to a proof query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResult {
    /// Whether the round has finalized.
    pub finalized: bool,
    /// Validated response, if the network produced one.
    pub result: Option<Response>,
}

impl ProofResult {
    /// Reply for a round that has not finalized yet.
    pub fn pending() -> Self {
        Self { finalized: false, result: None }
    }
}

/// Client side of the oracle network.
#[async_trait]
pub trait OracleNetworkClient: Send + Sync {
    /// Submit a request; `None` if the network rejected it.
    async fn submit_request(&self, request: &Request) -> Result<Option<RequestId>>;

    /// Whether a round has finalized.
    async fn round_finalized(&self, round: u64) -> Result<bool>;

    /// Suspend until a round has finalized.
    ///
    /// Implementations do not bound the wait; callers race it against their
    /// own timeout or cancellation.
    async fn wait_for_round_finalization(&self, round: u64) -> Result<()>;

    /// Fetch the response and Merkle proof for a request of a round.
    async fn obtain_proof(&self, round: u64, request_data: &Bytes) -> Result<ProofResult>;
}
