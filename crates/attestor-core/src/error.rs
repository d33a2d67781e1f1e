//! Error types and result handling for attestation encoding and hashing.
//!
//! Separates configuration errors (bad scheme tables), caller-input errors
//! (fields that cannot be encoded), and parse errors (byte buffers that do
//! not match a scheme layout). None of these are retried.

/// Errors raised by the scheme registry, codec and proof helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttestationError {
    /// No scheme is registered for the attestation type id.
    #[error("unsupported attestation type {id}")]
    UnsupportedAttestationType {
        /// Raw attestation type id.
        id: u16,
    },

    /// The source ledger id is unknown or not valid for the attestation type.
    #[error("source {source_id} is not supported by attestation type {attestation_type}")]
    UnsupportedSource {
        /// Attestation type the source was used with.
        attestation_type: u16,
        /// Raw source id.
        source_id: u32,
    },

    /// A scheme definition is inconsistent with itself or the registry.
    #[error("invalid scheme definition {name}: {reason}")]
    InvalidScheme {
        /// Definition name, e.g. `t-00001-payment`.
        name: String,
        /// What is wrong with the definition.
        reason: String,
    },

    /// The request has no value for a field the scheme declares.
    #[error("missing value for field {key}")]
    MissingField {
        /// Field key as declared in the scheme.
        key: String,
    },

    /// A value does not fit in the declared field width.
    #[error("field {key} needs {actual} bytes but is {width} bytes wide")]
    FieldTooLong {
        /// Field key.
        key: String,
        /// Declared width in bytes.
        width: usize,
        /// Bytes required by the value.
        actual: usize,
    },

    /// A negative number was supplied for an unsigned field.
    #[error("field {key} does not accept negative values")]
    NegativeValueUnsupported {
        /// Field key.
        key: String,
    },

    /// A numeric input could not be parsed.
    #[error("invalid number {value:?}")]
    InvalidNumber {
        /// The offending input.
        value: String,
    },

    /// The byte buffer does not match the scheme layout.
    #[error("malformed request: expected {expected} bytes, got {actual}")]
    MalformedRequest {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Response and request belong to different attestation types.
    #[error("response of type {response} does not match request of type {request}")]
    ResponseTypeMismatch {
        /// Attestation type of the request.
        request: u16,
        /// Attestation type of the response.
        response: u16,
    },

    /// A hex string could not be decoded into a 32-byte hash.
    #[error("invalid hash {value:?}")]
    InvalidHash {
        /// The offending input.
        value: String,
    },
}

impl AttestationError {
    /// Create a missing field error.
    pub fn missing_field(key: impl Into<String>) -> Self {
        Self::MissingField { key: key.into() }
    }

    /// Create an invalid scheme error.
    pub fn invalid_scheme(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScheme { name: name.into(), reason: reason.into() }
    }

    /// Create an invalid number error.
    pub fn invalid_number(value: impl Into<String>) -> Self {
        Self::InvalidNumber { value: value.into() }
    }

    /// Check if this error was caused by caller input rather than by a
    /// misconfigured scheme table.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::UnsupportedSource { .. }
            | Self::MissingField { .. }
            | Self::FieldTooLong { .. }
            | Self::NegativeValueUnsupported { .. }
            | Self::InvalidNumber { .. }
            | Self::MalformedRequest { .. }
            | Self::ResponseTypeMismatch { .. }
            | Self::InvalidHash { .. } => true,

            Self::UnsupportedAttestationType { .. } | Self::InvalidScheme { .. } => false,
        }
    }

    /// Check if this error is a configuration error, fatal at startup.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::UnsupportedAttestationType { .. } | Self::InvalidScheme { .. })
    }
}

/// Result type alias for attestation operations.
pub type Result<T> = std::result::Result<T, AttestationError>;
