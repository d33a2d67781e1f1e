//! Attestation schemes, request codec, response hashing and Merkle proofs.
//!
//! Everything in this crate is pure and synchronous. The scheme registry is
//! built once from compile-time definitions and shared read-only, so the
//! codec and Merkle engine can be called from any number of threads.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod merkle;
pub mod numeric;
pub mod request;
pub mod response;
pub mod scheme;
pub mod types;

pub use codec::{
    decode_request, encode_request, equals_request, message_integrity_code, response_hash,
    verify_attestation, ResponseHash, DEFAULT_MIC_SALT,
};
pub use error::{AttestationError, Result};
pub use merkle::MerkleTree;
pub use numeric::Numeric;
pub use request::{
    BalanceDecreasingTransactionRequest, ConfirmedBlockHeightExistsRequest, PaymentRequest,
    ReferencedPaymentNonexistenceRequest, Request, RequestBody,
};
pub use response::{
    BalanceDecreasingTransactionResponse, ConfirmedBlockHeightExistsResponse, PaymentResponse,
    ReferencedPaymentNonexistenceResponse, Response, ResponseBody,
};
pub use scheme::{
    AttestationTypeScheme, FieldKind, RequestFieldSpec, ResponseFieldSpec, SchemeDefinition,
    SchemeRegistry,
};
pub use types::{AttestationType, SourceId};
