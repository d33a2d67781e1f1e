//! Attestation type schemes and the registry that serves them.
//!
//! A scheme fixes the binary request layout and the ordered list of response
//! fields that feed the response hash. Definitions are compile-time
//! constants; the registry validates them once and is read-only afterwards,
//! so it can be shared between threads without locking.

use std::{collections::BTreeMap, sync::OnceLock};

use crate::{
    error::{AttestationError, Result},
    request,
    types::{AttestationType, SourceId},
};

/// How a request field is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Attestation type id, big-endian unsigned.
    AttestationType,
    /// Source ledger id, big-endian unsigned.
    SourceId,
    /// Non-negative integer, left-padded big-endian.
    NumberLike,
    /// Raw bytes, left-padded with zeros.
    ByteSequenceLike,
}

/// One field of the binary request layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFieldSpec {
    /// Field key.
    pub key: &'static str,
    /// Exact width in bytes.
    pub byte_size: usize,
    /// Encoding rule.
    pub kind: FieldKind,
}

/// One field of the response hash preimage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFieldSpec {
    /// Field key.
    pub key: &'static str,
    /// ABI type the value is encoded as.
    pub solidity_type: &'static str,
    /// Human readable description.
    pub description: &'static str,
}

/// A scheme as written down, before validation.
#[derive(Debug, Clone, Copy)]
pub struct SchemeDefinition {
    /// Definition name of the form `t-<5 digit id>-<name>`.
    pub definition_name: &'static str,
    /// Declared attestation type id.
    pub id: u16,
    /// Attestation type name.
    pub name: &'static str,
    /// Sources the attestation type is valid for.
    pub supported_sources: &'static [SourceId],
    /// Type-specific request fields, after the common prefix.
    pub request: &'static [RequestFieldSpec],
    /// Type-specific response hash fields, after the common prefix.
    pub response_hash: &'static [ResponseFieldSpec],
}

/// A validated attestation type scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationTypeScheme {
    /// Attestation type.
    pub id: AttestationType,
    /// Attestation type name.
    pub name: &'static str,
    /// Sources the attestation type is valid for.
    pub supported_sources: &'static [SourceId],
    /// Full request layout, common prefix first.
    pub request: Vec<RequestFieldSpec>,
    /// Type-specific response hash fields in preimage order.
    pub response_hash: &'static [ResponseFieldSpec],
}

impl AttestationTypeScheme {
    /// Total encoded request length in bytes.
    pub fn request_byte_len(&self) -> usize {
        self.request.iter().map(|f| f.byte_size).sum()
    }

    /// Whether requests for `source` are valid under this scheme.
    pub fn supports(&self, source: SourceId) -> bool {
        self.supported_sources.contains(&source)
    }
}

/// Fields every request starts with.
pub const COMMON_REQUEST_FIELDS: [RequestFieldSpec; 3] = [
    RequestFieldSpec { key: "attestationType", byte_size: 2, kind: FieldKind::AttestationType },
    RequestFieldSpec { key: "sourceId", byte_size: 4, kind: FieldKind::SourceId },
    RequestFieldSpec {
        key: "messageIntegrityCode",
        byte_size: 32,
        kind: FieldKind::ByteSequenceLike,
    },
];

/// Fields every response hash preimage starts with.
pub const COMMON_RESPONSE_FIELDS: [ResponseFieldSpec; 3] = [
    ResponseFieldSpec {
        key: "attestationType",
        solidity_type: "uint16",
        description: "Attestation type id",
    },
    ResponseFieldSpec { key: "sourceId", solidity_type: "uint32", description: "Source ledger id" },
    ResponseFieldSpec {
        key: "stateConnectorRound",
        solidity_type: "uint256",
        description: "Voting round in which the attestation was validated",
    },
];

const ALL_SOURCES: &[SourceId] =
    &[SourceId::Btc, SourceId::Ltc, SourceId::Doge, SourceId::Xrp, SourceId::Algo];

const fn number(key: &'static str, byte_size: usize) -> RequestFieldSpec {
    RequestFieldSpec { key, byte_size, kind: FieldKind::NumberLike }
}

const fn bytes(key: &'static str, byte_size: usize) -> RequestFieldSpec {
    RequestFieldSpec { key, byte_size, kind: FieldKind::ByteSequenceLike }
}

const fn response(
    key: &'static str,
    solidity_type: &'static str,
    description: &'static str,
) -> ResponseFieldSpec {
    ResponseFieldSpec { key, solidity_type, description }
}

/// Payment scheme.
pub const PAYMENT: SchemeDefinition = SchemeDefinition {
    definition_name: "t-00001-payment",
    id: 1,
    name: "Payment",
    supported_sources: ALL_SOURCES,
    request: &[bytes("id", 32), number("blockNumber", 4), number("inUtxo", 1), number("utxo", 1)],
    response_hash: &[
        response("blockNumber", "uint64", "Number of the block containing the transaction"),
        response("blockTimestamp", "uint64", "Timestamp of the block"),
        response("transactionHash", "bytes32", "Hash of the transaction"),
        response("inUtxo", "uint8", "Index of the source input"),
        response("utxo", "uint8", "Index of the receiving output"),
        response("sourceAddressHash", "bytes32", "Hash of the source address"),
        response("receivingAddressHash", "bytes32", "Hash of the receiving address"),
        response("spentAmount", "int256", "Amount that left the source address"),
        response("receivedAmount", "int256", "Amount that reached the receiving address"),
        response("paymentReference", "bytes32", "Payment reference, zero if absent"),
        response("oneToOne", "bool", "Single source and single receiver"),
        response("status", "uint8", "Transaction success status"),
    ],
};

/// Balance decreasing transaction scheme.
pub const BALANCE_DECREASING_TRANSACTION: SchemeDefinition = SchemeDefinition {
    definition_name: "t-00002-balance-decreasing-transaction",
    id: 2,
    name: "BalanceDecreasingTransaction",
    supported_sources: ALL_SOURCES,
    request: &[bytes("id", 32), number("blockNumber", 4), number("inUtxo", 1)],
    response_hash: &[
        response("blockNumber", "uint64", "Number of the block containing the transaction"),
        response("blockTimestamp", "uint64", "Timestamp of the block"),
        response("transactionHash", "bytes32", "Hash of the transaction"),
        response("inUtxo", "uint8", "Index of the source input"),
        response("sourceAddressHash", "bytes32", "Hash of the source address"),
        response("spentAmount", "int256", "Amount that left the source address"),
        response("paymentReference", "bytes32", "Payment reference, zero if absent"),
    ],
};

/// Confirmed block height scheme.
pub const CONFIRMED_BLOCK_HEIGHT_EXISTS: SchemeDefinition = SchemeDefinition {
    definition_name: "t-00003-confirmed-block-height-exists",
    id: 3,
    name: "ConfirmedBlockHeightExists",
    supported_sources: ALL_SOURCES,
    request: &[number("blockNumber", 4), number("queryWindow", 4)],
    response_hash: &[
        response("blockNumber", "uint64", "Number of the confirmed block"),
        response("blockTimestamp", "uint64", "Timestamp of the confirmed block"),
        response("numberOfConfirmations", "uint8", "Confirmation depth of the ledger"),
        response("averageBlockProductionTimeMs", "uint64", "Average block time in the window"),
        response("lowestQueryWindowBlockNumber", "uint64", "First block inside the window"),
        response("lowestQueryWindowBlockTimestamp", "uint64", "Timestamp of that block"),
    ],
};

/// Referenced payment nonexistence scheme.
pub const REFERENCED_PAYMENT_NONEXISTENCE: SchemeDefinition = SchemeDefinition {
    definition_name: "t-00004-referenced-payment-nonexistence",
    id: 4,
    name: "ReferencedPaymentNonexistence",
    supported_sources: ALL_SOURCES,
    request: &[
        number("minimalBlockNumber", 4),
        number("deadlineBlockNumber", 4),
        number("deadlineTimestamp", 4),
        bytes("destinationAddressHash", 32),
        number("amount", 16),
        bytes("paymentReference", 32),
    ],
    response_hash: &[
        response("deadlineBlockNumber", "uint64", "Last block of the search window"),
        response("deadlineTimestamp", "uint64", "Last timestamp of the search window"),
        response("destinationAddressHash", "bytes32", "Hash of the destination address"),
        response("paymentReference", "bytes32", "Reference the payment had to carry"),
        response("amount", "uint128", "Minimal amount the payment had to carry"),
        response("lowerBoundaryBlockNumber", "uint64", "First block of the search window"),
        response("lowerBoundaryBlockTimestamp", "uint64", "Timestamp of that block"),
        response("firstOverflowBlockNumber", "uint64", "First block past the deadline"),
        response("firstOverflowBlockTimestamp", "uint64", "Timestamp of that block"),
    ],
};

/// All built-in scheme definitions.
pub const DEFINITIONS: [SchemeDefinition; 4] = [
    PAYMENT,
    BALANCE_DECREASING_TRANSACTION,
    CONFIRMED_BLOCK_HEIGHT_EXISTS,
    REFERENCED_PAYMENT_NONEXISTENCE,
];

/// Validated, read-only catalog of attestation type schemes.
#[derive(Debug, Clone)]
pub struct SchemeRegistry {
    schemes: BTreeMap<u16, AttestationTypeScheme>,
}

impl SchemeRegistry {
    /// Validate `definitions` and build a registry from them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidScheme` if a definition's name does not encode its
    /// id, an id is unknown or duplicated, a field width is outside 1..=32,
    /// a field key repeats, or a field has no binding of its declared kind
    /// for its attestation type.
    pub fn load(definitions: &[SchemeDefinition]) -> Result<Self> {
        let mut schemes = BTreeMap::new();

        for definition in definitions {
            let scheme = validate(definition)?;
            if schemes.insert(definition.id, scheme).is_some() {
                return Err(AttestationError::invalid_scheme(
                    definition.definition_name,
                    format!("duplicate attestation type id {}", definition.id),
                ));
            }
        }

        Ok(Self { schemes })
    }

    /// Registry over the built-in definitions.
    pub fn builtin() -> Result<Self> {
        Self::load(&DEFINITIONS)
    }

    /// Process-wide registry over the built-in definitions.
    ///
    /// # Panics
    ///
    /// Panics if the built-in definitions are malformed, which is a
    /// programming error caught by this crate's tests.
    #[allow(clippy::expect_used)]
    pub fn global() -> &'static Self {
        static REGISTRY: OnceLock<SchemeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| Self::builtin().expect("built-in attestation schemes are valid"))
    }

    /// Scheme for a raw attestation type id.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAttestationType` if no scheme has that id.
    pub fn scheme(&self, id: u16) -> Result<&AttestationTypeScheme> {
        self.schemes.get(&id).ok_or(AttestationError::UnsupportedAttestationType { id })
    }

    /// Scheme for an attestation type.
    pub fn scheme_for(&self, attestation_type: AttestationType) -> Result<&AttestationTypeScheme> {
        self.scheme(attestation_type.id())
    }

    /// Iterate schemes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &AttestationTypeScheme> {
        self.schemes.values()
    }

    /// Number of registered schemes.
    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    /// Whether the registry has no schemes.
    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}

/// Extract the id encoded in a definition name such as `t-00001-payment`.
fn encoded_id(definition_name: &str) -> Option<u16> {
    let digits = definition_name.strip_prefix("t-")?.get(..5)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn validate(definition: &SchemeDefinition) -> Result<AttestationTypeScheme> {
    let name = definition.definition_name;

    match encoded_id(name) {
        Some(encoded) if encoded == definition.id => {},
        Some(encoded) => {
            return Err(AttestationError::invalid_scheme(
                name,
                format!("declared id {} does not match encoded id {encoded}", definition.id),
            ));
        },
        None => {
            return Err(AttestationError::invalid_scheme(name, "name does not encode an id"));
        },
    }

    let id = AttestationType::try_from(definition.id).map_err(|_| {
        AttestationError::invalid_scheme(name, format!("unknown attestation type {}", definition.id))
    })?;

    if definition.supported_sources.is_empty() {
        return Err(AttestationError::invalid_scheme(name, "no supported sources"));
    }

    let request: Vec<RequestFieldSpec> =
        COMMON_REQUEST_FIELDS.iter().chain(definition.request).copied().collect();

    for (index, field) in request.iter().enumerate() {
        if !(1..=32).contains(&field.byte_size) {
            return Err(AttestationError::invalid_scheme(
                name,
                format!("field {} has width {}", field.key, field.byte_size),
            ));
        }
        if request[..index].iter().any(|other| other.key == field.key) {
            return Err(AttestationError::invalid_scheme(
                name,
                format!("field {} declared twice", field.key),
            ));
        }
        match request::binding(id, field.key) {
            None => {
                return Err(AttestationError::invalid_scheme(
                    name,
                    format!("field {} has no binding for {id}", field.key),
                ));
            },
            Some(binding) if binding.kind != field.kind => {
                return Err(AttestationError::invalid_scheme(
                    name,
                    format!(
                        "field {} is declared {:?} but bound as {:?}",
                        field.key, field.kind, binding.kind
                    ),
                ));
            },
            Some(_) => {},
        }
    }

    Ok(AttestationTypeScheme {
        id,
        name: definition.name,
        supported_sources: definition.supported_sources,
        request,
        response_hash: definition.response_hash,
    })
}
