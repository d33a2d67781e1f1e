//! Integration tests for request encoding, decoding and response hashing.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use alloy_primitives::{Bytes, B256, I256, U128, U256};
use attestor_core::{
    decode_request, encode_request, equals_request, merkle, message_integrity_code,
    response_hash, verify_attestation, AttestationError, BalanceDecreasingTransactionRequest,
    ConfirmedBlockHeightExistsRequest, ConfirmedBlockHeightExistsResponse, MerkleTree, Numeric,
    PaymentRequest, PaymentResponse, ReferencedPaymentNonexistenceRequest,
    ReferencedPaymentNonexistenceResponse, Request, RequestBody, Response, ResponseHash,
    SourceId, DEFAULT_MIC_SALT,
};

fn payment_request() -> Request {
    Request::new(
        SourceId::Xrp,
        PaymentRequest {
            id: Bytes::from(vec![0xAA; 32]),
            block_number: 12345u32.into(),
            in_utxo: 0u8.into(),
            utxo: 1u8.into(),
        },
    )
}

fn payment_response(round: u64) -> Response {
    Response::new(PaymentResponse {
        block_number: 12345,
        block_timestamp: 1_700_000_000,
        transaction_hash: B256::repeat_byte(0xAA),
        in_utxo: 0,
        utxo: 1,
        source_address_hash: B256::repeat_byte(0x01),
        receiving_address_hash: B256::repeat_byte(0x02),
        spent_amount: I256::from_raw(U256::from(1_000u64)),
        received_amount: I256::from_raw(U256::from(990u64)),
        payment_reference: B256::ZERO,
        one_to_one: true,
        status: 0,
    })
    .with_round(round)
}

#[test]
fn payment_encoding_matches_fixed_layout() {
    let encoded = encode_request(&payment_request()).expect("payment encodes");

    assert_eq!(encoded.len(), 2 + 4 + 32 + 32 + 4 + 1 + 1);
    assert_eq!(&encoded[..2], &[0x00, 0x01]);
    assert_eq!(&encoded[2..6], &[0x00, 0x00, 0x00, 0x03]);
    assert!(encoded[6..38].iter().all(|b| *b == 0));
    assert!(encoded[38..70].iter().all(|b| *b == 0xAA));
}

#[test]
fn decode_inverts_encode_for_every_type() {
    let requests = vec![
        payment_request(),
        Request::new(
            SourceId::Btc,
            BalanceDecreasingTransactionRequest {
                id: Bytes::from(vec![0x11; 32]),
                block_number: "0x10".into(),
                in_utxo: 2u8.into(),
            },
        ),
        Request::new(
            SourceId::Doge,
            ConfirmedBlockHeightExistsRequest {
                block_number: 800_000u32.into(),
                query_window: 86_400u32.into(),
            },
        ),
        Request::new(
            SourceId::Ltc,
            ReferencedPaymentNonexistenceRequest {
                minimal_block_number: 100u32.into(),
                deadline_block_number: 200u32.into(),
                deadline_timestamp: 1_700_000_000u32.into(),
                destination_address_hash: Bytes::from(vec![0x22; 32]),
                amount: "1000000000000000000".into(),
                payment_reference: Bytes::from(vec![0x33; 32]),
            },
        )
        .with_message_integrity_code(B256::repeat_byte(0x44)),
    ];

    for request in requests {
        let encoded = encode_request(&request).expect("request encodes");
        let decoded = decode_request(&encoded).expect("request decodes");
        assert!(equals_request(&request, &decoded), "round trip failed for {request:?}");
        assert_eq!(encode_request(&decoded).expect("re-encodes"), encoded);
    }
}

#[test]
fn decode_rejects_wrong_lengths() {
    let encoded = encode_request(&payment_request()).expect("payment encodes");

    let truncated = &encoded[..encoded.len() - 1];
    assert_eq!(
        decode_request(truncated),
        Err(AttestationError::MalformedRequest { expected: 76, actual: 75 })
    );

    let mut extended = encoded.to_vec();
    extended.push(0);
    assert_eq!(
        decode_request(&extended),
        Err(AttestationError::MalformedRequest { expected: 76, actual: 77 })
    );
}

#[test]
fn decode_rejects_unknown_attestation_type() {
    let mut encoded = encode_request(&payment_request()).expect("payment encodes").to_vec();
    encoded[1] = 0x09;
    assert_eq!(
        decode_request(&encoded),
        Err(AttestationError::UnsupportedAttestationType { id: 9 })
    );
}

fn payment_with(update: impl FnOnce(&mut PaymentRequest)) -> Request {
    let mut request = payment_request();
    let RequestBody::Payment(body) = &mut request.body else {
        panic!("payment body");
    };
    update(body);
    request
}

#[test]
fn encode_rejects_bad_values() {
    let negative = payment_with(|body| body.utxo = Numeric::from(-1i32));
    assert_eq!(
        encode_request(&negative),
        Err(AttestationError::NegativeValueUnsupported { key: "utxo".into() })
    );

    let too_large = payment_with(|body| body.utxo = 256u32.into());
    assert_eq!(
        encode_request(&too_large),
        Err(AttestationError::FieldTooLong { key: "utxo".into(), width: 1, actual: 2 })
    );

    let long_id = payment_with(|body| body.id = Bytes::from(vec![0xFF; 33]));
    assert_eq!(
        encode_request(&long_id),
        Err(AttestationError::FieldTooLong { key: "id".into(), width: 32, actual: 33 })
    );

    let garbage = payment_with(|body| body.block_number = "twelve".into());
    assert_eq!(
        encode_request(&garbage),
        Err(AttestationError::InvalidNumber { value: "twelve".into() })
    );
}

#[test]
fn equality_is_numeric_for_number_fields() {
    let a = Request::new(
        SourceId::Btc,
        ConfirmedBlockHeightExistsRequest { block_number: "10".into(), query_window: 0u8.into() },
    );
    let b = Request::new(
        SourceId::Btc,
        ConfirmedBlockHeightExistsRequest { block_number: "0xA".into(), query_window: "0x0".into() },
    );
    let c = Request::new(
        SourceId::Btc,
        ConfirmedBlockHeightExistsRequest { block_number: "11".into(), query_window: 0u8.into() },
    );

    assert!(equals_request(&a, &b));
    assert!(!equals_request(&a, &c));
    assert!(!equals_request(&a, &payment_request()));

    let mut other_source = b.clone();
    other_source.source_id = SourceId::Ltc;
    assert!(!equals_request(&a, &other_source));
}

#[test]
fn response_hash_is_deterministic_and_field_sensitive() {
    let request = payment_request();
    let response = payment_response(7);

    let first = response_hash(&request, &response, None).expect("hashes");
    let second = response_hash(&request, &response, None).expect("hashes");
    assert_eq!(first, second);

    let mut changed = response.clone();
    if let attestor_core::ResponseBody::Payment(body) = &mut changed.body {
        body.status = 1;
    }
    assert_ne!(first, response_hash(&request, &changed, None).expect("hashes"));

    let other_round = payment_response(8);
    assert_ne!(first, response_hash(&request, &other_round, None).expect("hashes"));

    let salted = response_hash(&request, &response, Some(DEFAULT_MIC_SALT)).expect("hashes");
    assert_ne!(first, salted);
}

#[test]
fn response_without_round_is_incomplete() {
    let mut response = payment_response(0);
    response.state_connector_round = None;

    assert_eq!(
        response_hash(&payment_request(), &response, None),
        Ok(ResponseHash::Incomplete { missing: vec!["stateConnectorRound"] })
    );
}

#[test]
fn response_of_other_type_is_rejected() {
    let response = Response::new(ConfirmedBlockHeightExistsResponse::default()).with_round(1);
    assert_eq!(
        response_hash(&payment_request(), &response, None),
        Err(AttestationError::ResponseTypeMismatch { request: 1, response: 3 })
    );
}

#[test]
fn message_integrity_code_ignores_round() {
    let request = payment_request();
    let a = message_integrity_code(&request, &payment_response(3), DEFAULT_MIC_SALT)
        .expect("mic computes");
    let b = message_integrity_code(&request, &payment_response(999), DEFAULT_MIC_SALT)
        .expect("mic computes");
    assert_eq!(a, b);

    let expected = response_hash(&request, &payment_response(0), Some(DEFAULT_MIC_SALT))
        .expect("hashes")
        .complete()
        .expect("complete");
    assert_eq!(a, expected);

    let other_salt = message_integrity_code(&request, &payment_response(3), "other")
        .expect("mic computes");
    assert_ne!(a, other_salt);
}

#[test]
fn attestation_verifies_against_round_root() {
    let request = payment_request();
    let response = payment_response(12);
    let leaf = response_hash(&request, &response, None).unwrap().complete().unwrap();

    let rpne_request = Request::new(SourceId::Btc, ReferencedPaymentNonexistenceRequest::default());
    let rpne_response = Response::new(ReferencedPaymentNonexistenceResponse {
        amount: U128::from(5u8),
        ..Default::default()
    })
    .with_round(12);
    let other_leaf = response_hash(&rpne_request, &rpne_response, None).unwrap().complete().unwrap();

    let tree = MerkleTree::build([leaf, other_leaf, B256::repeat_byte(0x99)]);
    let root = tree.root().expect("non-empty tree");
    let proof = tree.proof_for_leaf(&leaf).expect("leaf is in tree");

    let proven = response.clone().with_merkle_proof(proof.clone());
    assert_eq!(verify_attestation(&request, &proven, root), Ok(true));
    assert!(merkle::verify(leaf, &proof, root));

    assert_eq!(verify_attestation(&request, &response, root), Ok(false));
    assert_eq!(verify_attestation(&request, &proven, B256::repeat_byte(0x01)), Ok(false));

    let mut tampered = proven;
    if let attestor_core::ResponseBody::Payment(body) = &mut tampered.body {
        body.block_timestamp += 1;
    }
    assert_eq!(verify_attestation(&request, &tampered, root), Ok(false));
}
