//! Typed attestation requests and their field binding tables.
//!
//! Each attestation type has its own request struct. The codec walks a
//! scheme's field list and reaches the values through the binding tables
//! below, one `(key, get, set)` entry per field, so no field is looked up by
//! reflection at runtime.

use alloy_primitives::{Bytes, B256, U256};

use crate::{
    numeric::Numeric,
    scheme::FieldKind,
    types::{AttestationType, SourceId},
};

/// An attestation request: common prefix plus a type-specific body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Source ledger the fact is about.
    pub source_id: SourceId,
    /// Salted hash of the anticipated response, zero when not supplied.
    pub message_integrity_code: B256,
    /// Type-specific fields.
    pub body: RequestBody,
}

/// Type-specific request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Payment request.
    Payment(PaymentRequest),
    /// Balance decreasing transaction request.
    BalanceDecreasingTransaction(BalanceDecreasingTransactionRequest),
    /// Confirmed block height request.
    ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsRequest),
    /// Referenced payment nonexistence request.
    ReferencedPaymentNonexistence(ReferencedPaymentNonexistenceRequest),
}

/// Prove that a transaction paid from one address to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Transaction id.
    pub id: Bytes,
    /// Number of the block containing the transaction.
    pub block_number: Numeric,
    /// Index of the input holding the source address.
    pub in_utxo: Numeric,
    /// Index of the output holding the receiving address.
    pub utxo: Numeric,
}

/// Prove that a transaction decreased the balance of an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceDecreasingTransactionRequest {
    /// Transaction id.
    pub id: Bytes,
    /// Number of the block containing the transaction.
    pub block_number: Numeric,
    /// Index of the input holding the source address.
    pub in_utxo: Numeric,
}

/// Prove that a block exists and is confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmedBlockHeightExistsRequest {
    /// Block number.
    pub block_number: Numeric,
    /// Window in seconds used to compute the average block time.
    pub query_window: Numeric,
}

/// Prove that no referenced payment reached an address before a deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencedPaymentNonexistenceRequest {
    /// First block of the search window.
    pub minimal_block_number: Numeric,
    /// Last block of the search window.
    pub deadline_block_number: Numeric,
    /// Last timestamp of the search window.
    pub deadline_timestamp: Numeric,
    /// Hash of the destination address.
    pub destination_address_hash: Bytes,
    /// Minimal amount the payment had to carry.
    pub amount: Numeric,
    /// Reference the payment had to carry.
    pub payment_reference: Bytes,
}

impl Request {
    /// Create a request with a zero message integrity code.
    pub fn new(source_id: SourceId, body: impl Into<RequestBody>) -> Self {
        Self { source_id, message_integrity_code: B256::ZERO, body: body.into() }
    }

    /// Replace the message integrity code.
    #[must_use]
    pub fn with_message_integrity_code(mut self, mic: B256) -> Self {
        self.message_integrity_code = mic;
        self
    }

    /// Attestation type, derived from the body variant.
    pub fn attestation_type(&self) -> AttestationType {
        self.body.attestation_type()
    }

    /// Empty request of the given type, filled in field by field on decode.
    pub(crate) fn empty(attestation_type: AttestationType, source_id: SourceId) -> Self {
        let body = match attestation_type {
            AttestationType::Payment => RequestBody::Payment(PaymentRequest::default()),
            AttestationType::BalanceDecreasingTransaction => {
                RequestBody::BalanceDecreasingTransaction(Default::default())
            },
            AttestationType::ConfirmedBlockHeightExists => {
                RequestBody::ConfirmedBlockHeightExists(Default::default())
            },
            AttestationType::ReferencedPaymentNonexistence => {
                RequestBody::ReferencedPaymentNonexistence(Default::default())
            },
        };
        Self::new(source_id, body)
    }
}

impl RequestBody {
    /// Attestation type of this body.
    pub fn attestation_type(&self) -> AttestationType {
        match self {
            Self::Payment(_) => AttestationType::Payment,
            Self::BalanceDecreasingTransaction(_) => AttestationType::BalanceDecreasingTransaction,
            Self::ConfirmedBlockHeightExists(_) => AttestationType::ConfirmedBlockHeightExists,
            Self::ReferencedPaymentNonexistence(_) => {
                AttestationType::ReferencedPaymentNonexistence
            },
        }
    }
}

impl From<PaymentRequest> for RequestBody {
    fn from(value: PaymentRequest) -> Self {
        Self::Payment(value)
    }
}

impl From<BalanceDecreasingTransactionRequest> for RequestBody {
    fn from(value: BalanceDecreasingTransactionRequest) -> Self {
        Self::BalanceDecreasingTransaction(value)
    }
}

impl From<ConfirmedBlockHeightExistsRequest> for RequestBody {
    fn from(value: ConfirmedBlockHeightExistsRequest) -> Self {
        Self::ConfirmedBlockHeightExists(value)
    }
}

impl From<ReferencedPaymentNonexistenceRequest> for RequestBody {
    fn from(value: ReferencedPaymentNonexistenceRequest) -> Self {
        Self::ReferencedPaymentNonexistence(value)
    }
}

/// Borrowed view of a field value.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FieldRef<'a> {
    AttestationType(AttestationType),
    Source(SourceId),
    Number(&'a Numeric),
    Bytes(&'a [u8]),
}

/// Decoded field value.
#[derive(Debug, Clone)]
pub(crate) enum FieldValue {
    AttestationType(AttestationType),
    Source(SourceId),
    Number(U256),
    Bytes(Bytes),
}

/// Accessors for one request field.
///
/// `get` yields `None` and `set` returns `false` when the request body is of
/// another attestation type or the value is of the wrong kind.
pub(crate) struct FieldBinding {
    pub key: &'static str,
    /// Kind of value `get` yields and `set` accepts.
    pub kind: FieldKind,
    pub get: for<'a> fn(&'a Request) -> Option<FieldRef<'a>>,
    pub set: fn(&mut Request, FieldValue) -> bool,
}

macro_rules! number_field {
    ($key:literal, $variant:ident . $field:ident) => {
        FieldBinding {
            key: $key,
            kind: FieldKind::NumberLike,
            get: |r| match &r.body {
                RequestBody::$variant(body) => Some(FieldRef::Number(&body.$field)),
                _ => None,
            },
            set: |r, v| match (&mut r.body, v) {
                (RequestBody::$variant(body), FieldValue::Number(n)) => {
                    body.$field = Numeric::Unsigned(n);
                    true
                },
                _ => false,
            },
        }
    };
}

macro_rules! bytes_field {
    ($key:literal, $variant:ident . $field:ident) => {
        FieldBinding {
            key: $key,
            kind: FieldKind::ByteSequenceLike,
            get: |r| match &r.body {
                RequestBody::$variant(body) => Some(FieldRef::Bytes(body.$field.as_ref())),
                _ => None,
            },
            set: |r, v| match (&mut r.body, v) {
                (RequestBody::$variant(body), FieldValue::Bytes(b)) => {
                    body.$field = b;
                    true
                },
                _ => false,
            },
        }
    };
}

static HEADER_FIELDS: [FieldBinding; 3] = [
    FieldBinding {
        key: "attestationType",
        kind: FieldKind::AttestationType,
        get: |r| Some(FieldRef::AttestationType(r.attestation_type())),
        set: |r, v| matches!(v, FieldValue::AttestationType(t) if t == r.attestation_type()),
    },
    FieldBinding {
        key: "sourceId",
        kind: FieldKind::SourceId,
        get: |r| Some(FieldRef::Source(r.source_id)),
        set: |r, v| match v {
            FieldValue::Source(source) => {
                r.source_id = source;
                true
            },
            _ => false,
        },
    },
    FieldBinding {
        key: "messageIntegrityCode",
        kind: FieldKind::ByteSequenceLike,
        get: |r| Some(FieldRef::Bytes(r.message_integrity_code.as_slice())),
        set: |r, v| match v {
            FieldValue::Bytes(b) if b.len() == 32 => {
                r.message_integrity_code = B256::from_slice(&b);
                true
            },
            _ => false,
        },
    },
];

static PAYMENT_FIELDS: [FieldBinding; 4] = [
    bytes_field!("id", Payment.id),
    number_field!("blockNumber", Payment.block_number),
    number_field!("inUtxo", Payment.in_utxo),
    number_field!("utxo", Payment.utxo),
];

static BALANCE_DECREASING_TRANSACTION_FIELDS: [FieldBinding; 3] = [
    bytes_field!("id", BalanceDecreasingTransaction.id),
    number_field!("blockNumber", BalanceDecreasingTransaction.block_number),
    number_field!("inUtxo", BalanceDecreasingTransaction.in_utxo),
];

static CONFIRMED_BLOCK_HEIGHT_EXISTS_FIELDS: [FieldBinding; 2] = [
    number_field!("blockNumber", ConfirmedBlockHeightExists.block_number),
    number_field!("queryWindow", ConfirmedBlockHeightExists.query_window),
];

static REFERENCED_PAYMENT_NONEXISTENCE_FIELDS: [FieldBinding; 6] = [
    number_field!("minimalBlockNumber", ReferencedPaymentNonexistence.minimal_block_number),
    number_field!("deadlineBlockNumber", ReferencedPaymentNonexistence.deadline_block_number),
    number_field!("deadlineTimestamp", ReferencedPaymentNonexistence.deadline_timestamp),
    bytes_field!("destinationAddressHash", ReferencedPaymentNonexistence.destination_address_hash),
    number_field!("amount", ReferencedPaymentNonexistence.amount),
    bytes_field!("paymentReference", ReferencedPaymentNonexistence.payment_reference),
];

/// Binding for `key` on requests of `attestation_type`.
pub(crate) fn binding(attestation_type: AttestationType, key: &str) -> Option<&'static FieldBinding> {
    let body_fields: &'static [FieldBinding] = match attestation_type {
        AttestationType::Payment => &PAYMENT_FIELDS,
        AttestationType::BalanceDecreasingTransaction => &BALANCE_DECREASING_TRANSACTION_FIELDS,
        AttestationType::ConfirmedBlockHeightExists => &CONFIRMED_BLOCK_HEIGHT_EXISTS_FIELDS,
        AttestationType::ReferencedPaymentNonexistence => &REFERENCED_PAYMENT_NONEXISTENCE_FIELDS,
    };
    HEADER_FIELDS.iter().chain(body_fields).find(|b| b.key == key)
}
