//! Binary request codec and response hashing.
//!
//! Requests are encoded as the concatenation of their fields in scheme order,
//! each big-endian and left-padded to its declared width. There are no
//! delimiters; the scheme layout makes the buffer self-describing.

use alloy_primitives::{keccak256, Bytes, B256, U256};

use crate::{
    error::{AttestationError, Result},
    merkle,
    request::{self, FieldRef, FieldValue, Request},
    response::Response,
    scheme::{AttestationTypeScheme, FieldKind, RequestFieldSpec, SchemeRegistry, COMMON_REQUEST_FIELDS},
    types::{AttestationType, SourceId},
};

/// Salt used for message integrity codes on the public oracle network.
pub const DEFAULT_MIC_SALT: &str = "Flare";

/// Outcome of hashing a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseHash {
    /// All preimage fields were present.
    Complete(B256),
    /// The response lacks fields the preimage needs.
    Incomplete {
        /// Keys of the absent fields.
        missing: Vec<&'static str>,
    },
}

impl ResponseHash {
    /// The hash, if complete.
    pub fn complete(&self) -> Option<B256> {
        match self {
            Self::Complete(hash) => Some(*hash),
            Self::Incomplete { .. } => None,
        }
    }
}

/// Encode a request into its fixed-width binary layout.
///
/// # Errors
///
/// Fails with `UnsupportedSource` if the scheme does not list the request's
/// source, `MissingField` if a scheme field has no value on the request,
/// `NegativeValueUnsupported`/`InvalidNumber` for unusable numbers and
/// `FieldTooLong` if a value does not fit its width.
pub fn encode_request(request: &Request) -> Result<Bytes> {
    let scheme = SchemeRegistry::global().scheme_for(request.attestation_type())?;
    ensure_supported(scheme, request.source_id)?;

    let mut out = Vec::with_capacity(scheme.request_byte_len());
    for field in &scheme.request {
        let value = request::binding(scheme.id, field.key)
            .and_then(|binding| (binding.get)(request))
            .ok_or_else(|| AttestationError::missing_field(field.key))?;
        encode_field(scheme, field, value, &mut out)?;
    }

    Ok(out.into())
}

/// Decode a binary request.
///
/// The buffer length must equal the scheme's total width exactly. Byte
/// fields come back at their full declared width.
///
/// # Errors
///
/// Fails with `MalformedRequest` on a length mismatch,
/// `UnsupportedAttestationType` for an unknown type prefix and
/// `UnsupportedSource` for a source the scheme does not list.
pub fn decode_request(data: &[u8]) -> Result<Request> {
    let type_width = COMMON_REQUEST_FIELDS[0].byte_size;
    let Some(prefix) = data.get(..type_width) else {
        return Err(AttestationError::MalformedRequest { expected: type_width, actual: data.len() });
    };
    let raw_type = u16::from_be_bytes([prefix[0], prefix[1]]);

    let scheme = SchemeRegistry::global().scheme(raw_type)?;
    let expected = scheme.request_byte_len();
    if data.len() != expected {
        return Err(AttestationError::MalformedRequest { expected, actual: data.len() });
    }

    // The real source is written by the `sourceId` field below.
    let mut request = Request::empty(scheme.id, SourceId::Btc);
    let mut offset = 0;
    for field in &scheme.request {
        let chunk = &data[offset..offset + field.byte_size];
        offset += field.byte_size;

        let value = decode_field(scheme, field, chunk)?;
        let applied = request::binding(scheme.id, field.key)
            .is_some_and(|binding| (binding.set)(&mut request, value));
        if !applied {
            return Err(AttestationError::invalid_scheme(
                scheme.name,
                format!("field {} cannot be decoded into a {} request", field.key, scheme.id),
            ));
        }
    }

    ensure_supported(scheme, request.source_id)?;
    Ok(request)
}

/// Compare two requests field by field.
///
/// Number-like fields compare numerically, so `"10"` equals `"0xA"`. Byte
/// fields compare as encoded, left-padded to their width, so a short value
/// equals its decoded form. Every other field compares exactly.
pub fn equals_request(a: &Request, b: &Request) -> bool {
    if a.attestation_type() != b.attestation_type() {
        return false;
    }
    let Ok(scheme) = SchemeRegistry::global().scheme_for(a.attestation_type()) else {
        return false;
    };

    scheme.request.iter().all(|field| {
        let Some(binding) = request::binding(scheme.id, field.key) else {
            return false;
        };
        match ((binding.get)(a), (binding.get)(b)) {
            (Some(FieldRef::Number(x)), Some(FieldRef::Number(y))) => x == y,
            (Some(FieldRef::Bytes(x)), Some(FieldRef::Bytes(y))) => {
                padded_bytes_eq(x, y, field.byte_size)
            },
            (Some(FieldRef::Source(x)), Some(FieldRef::Source(y))) => x == y,
            (Some(FieldRef::AttestationType(x)), Some(FieldRef::AttestationType(y))) => x == y,
            _ => false,
        }
    })
}

/// Hash a response the way on-chain verifiers do.
///
/// The preimage is the ABI encoding of `(attestationType, sourceId,
/// stateConnectorRound, <scheme response fields>)`, with `salt` appended as
/// a string when given, hashed once with Keccak-256. A response without a
/// round yields [`ResponseHash::Incomplete`].
///
/// # Errors
///
/// Fails with `ResponseTypeMismatch` if the response is of another
/// attestation type than the request.
pub fn response_hash(
    request: &Request,
    response: &Response,
    salt: Option<&str>,
) -> Result<ResponseHash> {
    let scheme = SchemeRegistry::global().scheme_for(request.attestation_type())?;
    if response.attestation_type() != scheme.id {
        return Err(AttestationError::ResponseTypeMismatch {
            request: scheme.id.id(),
            response: response.attestation_type().id(),
        });
    }

    let Some(round) = response.state_connector_round else {
        return Ok(ResponseHash::Incomplete { missing: vec!["stateConnectorRound"] });
    };

    let preimage = response.body.hash_preimage(scheme.id, request.source_id, round, salt);
    Ok(ResponseHash::Complete(keccak256(preimage)))
}

/// Message integrity code for a request anticipating `anticipated`.
///
/// The requester cannot know the round in advance, so the hash is taken
/// with the round set to zero.
pub fn message_integrity_code(
    request: &Request,
    anticipated: &Response,
    salt: &str,
) -> Result<B256> {
    let mut anticipated = anticipated.clone();
    anticipated.state_connector_round = Some(0);

    response_hash(request, &anticipated, Some(salt))?
        .complete()
        .ok_or_else(|| AttestationError::missing_field("stateConnectorRound"))
}

/// Check that a proven response is included under a round's Merkle root.
///
/// Returns `false` for responses without a round or without a proof.
pub fn verify_attestation(request: &Request, response: &Response, merkle_root: B256) -> Result<bool> {
    let Some(leaf) = response_hash(request, response, None)?.complete() else {
        return Ok(false);
    };
    let Some(proof) = &response.merkle_proof else {
        return Ok(false);
    };
    Ok(merkle::verify(leaf, proof, merkle_root))
}

fn ensure_supported(scheme: &AttestationTypeScheme, source: SourceId) -> Result<()> {
    if scheme.supports(source) {
        Ok(())
    } else {
        Err(AttestationError::UnsupportedSource {
            attestation_type: scheme.id.id(),
            source_id: source.id(),
        })
    }
}

fn encode_field(
    scheme: &AttestationTypeScheme,
    field: &RequestFieldSpec,
    value: FieldRef<'_>,
    out: &mut Vec<u8>,
) -> Result<()> {
    match (field.kind, value) {
        (FieldKind::AttestationType, FieldRef::AttestationType(t)) => {
            write_uint(field, U256::from(t.id()), out)
        },
        (FieldKind::SourceId, FieldRef::Source(source)) => {
            write_uint(field, U256::from(source.id()), out)
        },
        (FieldKind::NumberLike, FieldRef::Number(number)) => {
            write_uint(field, number.resolve(field.key)?, out)
        },
        (FieldKind::ByteSequenceLike, FieldRef::Bytes(bytes)) => write_bytes(field, bytes, out),
        (kind, _) => Err(AttestationError::invalid_scheme(
            scheme.name,
            format!("field {} is declared {kind:?} but bound to another kind", field.key),
        )),
    }
}

fn write_uint(field: &RequestFieldSpec, value: U256, out: &mut Vec<u8>) -> Result<()> {
    let needed = value.byte_len();
    if needed > field.byte_size {
        return Err(AttestationError::FieldTooLong {
            key: field.key.to_string(),
            width: field.byte_size,
            actual: needed,
        });
    }
    let word = value.to_be_bytes::<32>();
    out.extend_from_slice(&word[32 - field.byte_size..]);
    Ok(())
}

fn write_bytes(field: &RequestFieldSpec, bytes: &[u8], out: &mut Vec<u8>) -> Result<()> {
    if bytes.len() > field.byte_size {
        return Err(AttestationError::FieldTooLong {
            key: field.key.to_string(),
            width: field.byte_size,
            actual: bytes.len(),
        });
    }
    out.resize(out.len() + field.byte_size - bytes.len(), 0);
    out.extend_from_slice(bytes);
    Ok(())
}

/// Equality of two byte values after left-padding both to `width`.
///
/// Values longer than `width` cannot be encoded and compare exactly.
fn padded_bytes_eq(x: &[u8], y: &[u8], width: usize) -> bool {
    if x.len() > width || y.len() > width {
        return x == y;
    }
    let (short, long) = if x.len() <= y.len() { (x, y) } else { (y, x) };
    let (padding, rest) = long.split_at(long.len() - short.len());
    padding.iter().all(|b| *b == 0) && rest == short
}

fn decode_field(
    scheme: &AttestationTypeScheme,
    field: &RequestFieldSpec,
    chunk: &[u8],
) -> Result<FieldValue> {
    let value = || U256::from_be_slice(chunk);

    match field.kind {
        FieldKind::AttestationType => {
            let id = u16::try_from(value())
                .map_err(|_| AttestationError::UnsupportedAttestationType { id: u16::MAX })?;
            Ok(FieldValue::AttestationType(AttestationType::try_from(id)?))
        },
        FieldKind::SourceId => {
            let unsupported = |source_id| AttestationError::UnsupportedSource {
                attestation_type: scheme.id.id(),
                source_id,
            };
            let id = u32::try_from(value()).map_err(|_| unsupported(u32::MAX))?;
            SourceId::from_id(id).map(FieldValue::Source).ok_or_else(|| unsupported(id))
        },
        FieldKind::NumberLike => Ok(FieldValue::Number(value())),
        FieldKind::ByteSequenceLike => Ok(FieldValue::Bytes(Bytes::copy_from_slice(chunk))),
    }
}
