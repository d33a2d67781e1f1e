//! Error types for the attestation client protocol.
//!
//! Separates ledger lookup failures, oracle network failures and caller
//! interruptions. A claim the oracle network refused to validate is not an
//! error; see [`ProofOutcome`](crate::prover::ProofOutcome).

use attestor_core::AttestationError;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised while locating, submitting or fetching attestations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Encoding, hashing or scheme error from the codec.
    #[error(transparent)]
    Attestation(#[from] AttestationError),

    /// A transaction or block the proof depends on is not on the ledger yet.
    #[error("{subject} not found on source ledger at height {chain_height}")]
    SubjectNotFound {
        /// What could not be located.
        subject: String,
        /// Ledger height at the time of the lookup.
        chain_height: u64,
    },

    /// No block past the deadline exists yet.
    #[error(
        "no overflow block after block {deadline_block} and timestamp {deadline_timestamp} \
         at height {chain_height}"
    )]
    OverflowBlockNotFound {
        /// Last block of the search window.
        deadline_block: u64,
        /// Last timestamp of the search window.
        deadline_timestamp: u64,
        /// Ledger height at the time of the lookup.
        chain_height: u64,
    },

    /// The source ledger backend failed.
    #[error("source ledger error: {message}")]
    Ledger {
        /// Error message from the ledger backend.
        message: String,
    },

    /// The oracle network could not be reached.
    #[error("oracle network unavailable: {message}")]
    OracleUnavailable {
        /// Error message describing the failure.
        message: String,
    },

    /// An oracle request timed out.
    #[error("oracle request timeout after {timeout_seconds}s")]
    Timeout {
        /// Configured request timeout.
        timeout_seconds: u64,
    },

    /// The oracle network rejected the call (4xx).
    #[error("oracle client error: HTTP {status_code}")]
    OracleClientError {
        /// HTTP status code.
        status_code: u16,
        /// Response body.
        body: String,
    },

    /// The oracle network failed to serve the call (5xx).
    #[error("oracle server error: HTTP {status_code}")]
    OracleServerError {
        /// HTTP status code.
        status_code: u16,
        /// Response body.
        body: String,
    },

    /// The oracle network replied with something that is not understood.
    #[error("invalid oracle response: {message}")]
    InvalidResponse {
        /// What was wrong with the reply.
        message: String,
    },

    /// The round did not finalize within the configured bound.
    #[error("round {round} did not finalize in time")]
    FinalizationTimeout {
        /// Voting round that was awaited.
        round: u64,
    },

    /// The caller abandoned the proof flow.
    #[error("proof flow cancelled")]
    Cancelled,

    /// Invalid client configuration.
    #[error("invalid client configuration: {message}")]
    Configuration {
        /// Configuration error message.
        message: String,
    },
}

impl ClientError {
    /// Creates a subject not found error.
    pub fn not_found(subject: impl Into<String>, chain_height: u64) -> Self {
        Self::SubjectNotFound { subject: subject.into(), chain_height }
    }

    /// Creates a ledger backend error.
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger { message: message.into() }
    }

    /// Creates an oracle unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::OracleUnavailable { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates an oracle client error from an HTTP response.
    pub fn client_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::OracleClientError { status_code, body: body.into() }
    }

    /// Creates an oracle server error from an HTTP response.
    pub fn server_error(status_code: u16, body: impl Into<String>) -> Self {
        Self::OracleServerError { status_code, body: body.into() }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Determines if this error represents a temporary oracle failure that
    /// may succeed when polled again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable { .. } | Self::Timeout { .. } | Self::OracleServerError { .. }
        )
    }

    /// Determines if this error was caused by caller input.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Attestation(e) => e.is_client_error(),
            Self::OracleClientError { .. } | Self::Configuration { .. } => true,
            _ => false,
        }
    }

    /// Determines if a ledger subject was missing. The caller may retry once
    /// the ledger has advanced.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SubjectNotFound { .. } | Self::OverflowBlockNotFound { .. })
    }

    /// Ledger height recorded with a lookup failure.
    pub fn chain_height(&self) -> Option<u64> {
        match self {
            Self::SubjectNotFound { chain_height, .. }
            | Self::OverflowBlockNotFound { chain_height, .. } => Some(*chain_height),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ClientError::timeout(30).is_retryable());
        assert!(ClientError::unavailable("connection refused").is_retryable());
        assert!(ClientError::server_error(503, "").is_retryable());
        assert!(!ClientError::client_error(400, "").is_retryable());
        assert!(!ClientError::Cancelled.is_retryable());
        assert!(!ClientError::FinalizationTimeout { round: 3 }.is_retryable());

        assert!(ClientError::client_error(404, "").is_client_error());
        assert!(ClientError::from(AttestationError::missing_field("id")).is_client_error());
        assert!(!ClientError::from(AttestationError::UnsupportedAttestationType { id: 7 })
            .is_client_error());
    }

    #[test]
    fn lookup_failures_carry_chain_height() {
        let err = ClientError::not_found("transaction 0xab", 41);
        assert!(err.is_not_found());
        assert_eq!(err.chain_height(), Some(41));
        assert_eq!(err.to_string(), "transaction 0xab not found on source ledger at height 41");

        let err = ClientError::OverflowBlockNotFound {
            deadline_block: 10,
            deadline_timestamp: 1000,
            chain_height: 12,
        };
        assert!(err.is_not_found());
        assert_eq!(err.chain_height(), Some(12));
        assert_eq!(ClientError::Cancelled.chain_height(), None);
    }
}
