//! JSON over HTTP oracle network client.
//!
//! Speaks to an attestation provider exposing three endpoints:
//!
//! - `POST /api/request` with `{"requestBytes"}`, answered by
//!   `{"status": "OK", "round"}` or `{"status": "REJECTED"}`
//! - `GET /api/round/{n}`, answered by `{"round", "finalized"}`
//! - `POST /api/proof` with `{"roundId", "requestBytes"}`, answered by
//!   `{"finalized", "result"}`

use std::time::Duration;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use attestor_core::{encode_request, Request, Response};
use reqwest::RequestBuilder;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::{
    error::{ClientError, Result},
    oracle::{OracleNetworkClient, ProofResult, RequestId},
    poll::{FinalizationPoller, PollPolicy},
};

/// Configuration for the HTTP oracle client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the attestation provider.
    pub base_url: String,
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9500".to_string(),
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: concat!("attestor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    request_bytes: &'a Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum SubmitStatus {
    Ok,
    Rejected,
}

#[derive(Debug, Deserialize)]
struct SubmitReply {
    status: SubmitStatus,
    #[serde(default)]
    round: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RoundReply {
    round: u64,
    finalized: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofBody<'a> {
    round_id: u64,
    request_bytes: &'a Bytes,
}

#[derive(Debug, Deserialize)]
struct ProofReply {
    finalized: bool,
    #[serde(default)]
    result: Option<Response>,
}

/// Oracle network client over the provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpOracleClient {
    client: reqwest::Client,
    config: ClientConfig,
    poller: FinalizationPoller,
}

impl HttpOracleClient {
    /// Creates a client that polls finalization with `poll_policy`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the base URL is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig, poll_policy: PollPolicy) -> Result<Self> {
        Self::with_poller(config, FinalizationPoller::new(poll_policy))
    }

    /// Creates a client with an injected poller.
    pub fn with_poller(config: ClientConfig, poller: FinalizationPoller) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::configuration("oracle base URL is empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config, poller })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends a request and decodes a JSON reply, categorizing failures.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "oracle request failed");
                if e.is_timeout() {
                    return Err(ClientError::timeout(self.config.timeout.as_secs()));
                }
                if e.is_connect() {
                    return Err(ClientError::unavailable(format!("connection failed: {e}")));
                }
                return Err(ClientError::unavailable(e.to_string()));
            },
        };

        let status = response.status();
        debug!(status = status.as_u16(), "received oracle response");

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::invalid_response(format!("undecodable body: {e}")));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("[failed to read response body: {e}]"),
        };
        if status.is_server_error() {
            Err(ClientError::server_error(status.as_u16(), body))
        } else {
            Err(ClientError::client_error(status.as_u16(), body))
        }
    }
}

#[async_trait]
impl OracleNetworkClient for HttpOracleClient {
    async fn submit_request(&self, request: &Request) -> Result<Option<RequestId>> {
        let data = encode_request(request)?;
        let span = info_span!(
            "oracle_submit",
            attestation_type = %request.attestation_type(),
            source = %request.source_id,
        );

        async move {
            let body = SubmitBody { request_bytes: &data };
            let reply: SubmitReply =
                self.send(self.client.post(self.url("/api/request")).json(&body)).await?;

            match (reply.status, reply.round) {
                (SubmitStatus::Ok, Some(round)) => {
                    debug!(round, "request accepted");
                    Ok(Some(RequestId { round, data }))
                },
                (SubmitStatus::Ok, None) => {
                    Err(ClientError::invalid_response("accepted request without a round"))
                },
                (SubmitStatus::Rejected, _) => {
                    warn!("request rejected by oracle network");
                    Ok(None)
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn round_finalized(&self, round: u64) -> Result<bool> {
        let reply: RoundReply =
            self.send(self.client.get(self.url(&format!("/api/round/{round}")))).await?;
        if reply.round != round {
            return Err(ClientError::invalid_response(format!(
                "asked for round {round}, got round {}",
                reply.round
            )));
        }
        Ok(reply.finalized)
    }

    async fn wait_for_round_finalization(&self, round: u64) -> Result<()> {
        self.poller
            .wait_until(round, || self.round_finalized(round))
            .instrument(info_span!("oracle_wait_round", round))
            .await
    }

    async fn obtain_proof(&self, round: u64, request_data: &Bytes) -> Result<ProofResult> {
        let body = ProofBody { round_id: round, request_bytes: request_data };
        let reply: ProofReply = self
            .send(self.client.post(self.url("/api/proof")).json(&body))
            .instrument(info_span!("oracle_obtain_proof", round))
            .await?;
        Ok(ProofResult { finalized: reply.finalized, result: reply.result })
    }
}
