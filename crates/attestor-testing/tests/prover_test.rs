//! Proof flows against the in-memory chain and oracle network.
//!
//! Covers every terminal state of the request, finalize and fetch protocol
//! plus the ledger-side lookups of the four attestation types.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use std::{sync::Arc, time::Duration};

use alloy_primitives::B256;
use attestor_client::{
    address_hash, ClientError, FailureReason, ProofOutcome, ProofStage, ProverConfig,
};
use attestor_core::{verify_attestation, ResponseBody, SourceId};
use attestor_testing::{
    expected_response, fixtures::payment_request, FinalizationMode, TestEnv, TransactionBuilder,
    FIRST_ROUND, GENESIS_TIMESTAMP,
};
use tokio_util::sync::CancellationToken;

const REFERENCE: B256 = B256::repeat_byte(0x42);

fn assert_not_proved(outcome: &ProofOutcome, expected_stage: ProofStage) {
    match outcome {
        ProofOutcome::Failed { reason, stage } => {
            assert_eq!(*reason, FailureReason::NotProved);
            assert_eq!(*stage, expected_stage);
        },
        ProofOutcome::Proved(proof) => panic!("expected failure, got proof {proof:?}"),
    }
}

#[tokio::test]
async fn proves_payment_end_to_end() {
    let env = TestEnv::new(SourceId::Btc, 3, FinalizationMode::Auto);
    let tx = TransactionBuilder::new()
        .input("alice", 1_000)
        .output("carol", 10)
        .output("bob", 600)
        .output("alice", 380)
        .reference(REFERENCE)
        .build();
    env.chain.mine_empty(2);
    let block = env.chain.mine(vec![tx.clone()]);
    env.chain.mine_empty(3);

    let outcome = env.prover.prove_payment(tx.hash, Some("alice"), Some("bob")).await.unwrap();
    let proof = outcome.into_proof().expect("payment should be proved");

    assert_eq!(proof.request_id.round, FIRST_ROUND);
    let ResponseBody::Payment(body) = &proof.response.body else {
        panic!("expected payment response");
    };
    assert_eq!(body.block_number, block.number);
    assert_eq!(body.utxo, 1);
    assert_eq!(body.receiving_address_hash, address_hash("bob"));
    assert_eq!(body.payment_reference, REFERENCE);
    assert!(!body.one_to_one);

    let root = env.oracle.merkle_root(proof.request_id.round).unwrap();
    assert!(verify_attestation(&proof.request, &proof.response, root).unwrap());
}

#[tokio::test]
async fn proves_balance_decreasing_transaction() {
    let env = TestEnv::new(SourceId::Ltc, 1, FinalizationMode::Auto);
    let tx = TransactionBuilder::new().input("bob", 50).input("alice", 70).output("carol", 110).build();
    env.chain.mine(vec![tx.clone()]);
    env.chain.mine_empty(1);

    let outcome =
        env.prover.prove_balance_decreasing_transaction(tx.hash, Some("alice")).await.unwrap();
    let proof = outcome.into_proof().expect("transaction should be proved");

    let ResponseBody::BalanceDecreasingTransaction(body) = proof.response.body else {
        panic!("expected balance decreasing response");
    };
    assert_eq!(body.in_utxo, 1);
    assert_eq!(body.source_address_hash, address_hash("alice"));
}

#[tokio::test]
async fn proves_confirmed_block_height() {
    let env = TestEnv::new(SourceId::Doge, 2, FinalizationMode::Auto);
    env.chain.mine_empty(12);

    let outcome = env.prover.prove_confirmed_block_height_exists(40).await.unwrap();
    let proof = outcome.into_proof().expect("block height should be proved");

    let ResponseBody::ConfirmedBlockHeightExists(body) = proof.response.body else {
        panic!("expected block height response");
    };
    assert_eq!(body.block_number, 10);
    assert_eq!(body.lowest_query_window_block_number, 6);
    assert_eq!(body.number_of_confirmations, 2);
}

#[tokio::test]
async fn block_height_on_shallow_chain_is_not_found() {
    let env = TestEnv::new(SourceId::Doge, 5, FinalizationMode::Auto);
    env.chain.mine_empty(3);

    let err = env.prover.prove_confirmed_block_height_exists(10).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.chain_height(), Some(3));
}

#[tokio::test]
async fn rejected_submission_fails_at_submitted() {
    let env = TestEnv::new(SourceId::Btc, 1, FinalizationMode::Auto);
    env.chain.mine_empty(5);
    env.oracle.reject_submissions(true);

    let outcome = env.prover.prove_confirmed_block_height_exists(10).await.unwrap();

    assert_not_proved(&outcome, ProofStage::Submitted);
}

#[tokio::test]
async fn withheld_proof_fails_at_fetched() {
    let env = TestEnv::new(SourceId::Btc, 1, FinalizationMode::Auto);
    env.chain.mine_empty(5);
    env.oracle.withhold_proofs(true);

    let outcome = env.prover.prove_confirmed_block_height_exists(10).await.unwrap();

    assert_not_proved(&outcome, ProofStage::Fetched);
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let env = TestEnv::new(SourceId::Btc, 1, FinalizationMode::Auto);
    env.chain.mine_empty(4);

    let err = env.prover.prove_payment(B256::repeat_byte(7), None, None).await.unwrap_err();

    match err {
        ClientError::SubjectNotFound { chain_height, .. } => assert_eq!(chain_height, 4),
        other => panic!("expected SubjectNotFound, got {other:?}"),
    }
    assert_eq!(env.oracle.submission_count(), 0);
}

#[tokio::test]
async fn unconfirmed_transaction_is_not_found() {
    let env = TestEnv::new(SourceId::Btc, 6, FinalizationMode::Auto);
    let tx = TransactionBuilder::new().input("alice", 1).output("bob", 1).build();
    env.chain.mine(vec![tx.clone()]);
    env.chain.mine_empty(5);

    let err = env.prover.prove_payment(tx.hash, None, None).await.unwrap_err();
    assert!(err.is_not_found());

    env.chain.mine_empty(1);
    let outcome = env.prover.prove_payment(tx.hash, None, None).await.unwrap();
    assert!(outcome.is_proved());
}

#[tokio::test]
async fn unknown_address_is_not_found() {
    let env = TestEnv::new(SourceId::Btc, 0, FinalizationMode::Auto);
    let tx = TransactionBuilder::new().input("alice", 1).output("bob", 1).build();
    env.chain.mine(vec![tx.clone()]);
    env.chain.mine_empty(2);

    let err = env.prover.prove_payment(tx.hash, Some("mallory"), None).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.chain_height(), Some(3));

    let err = env
        .prover
        .prove_balance_decreasing_transaction(tx.hash, Some("mallory"))
        .await
        .unwrap_err();
    assert_eq!(err.chain_height(), Some(3));
}

#[tokio::test]
async fn anticipated_response_sets_integrity_code() {
    let env = TestEnv::new(SourceId::Btc, 1, FinalizationMode::Auto);
    let tx = TransactionBuilder::new().input("alice", 5).output("bob", 5).build();
    let block = env.chain.mine(vec![tx.clone()]);
    env.chain.mine_empty(1);

    let request = payment_request(SourceId::Btc, tx.hash, block.number, 0, 0);
    let anticipated = expected_response(&env.chain, &request).unwrap();

    let outcome = env.prover.prove_anticipated(request.clone(), &anticipated).await.unwrap();
    let proof = outcome.into_proof().expect("anticipated response should be proved");
    assert!(!proof.request.message_integrity_code.is_zero());

    let mut wrong = anticipated;
    if let ResponseBody::Payment(body) = &mut wrong.body {
        body.one_to_one = !body.one_to_one;
    }
    let outcome = env.prover.prove_anticipated(request, &wrong).await.unwrap();
    assert_not_proved(&outcome, ProofStage::Fetched);
}

#[tokio::test]
async fn finalization_timeout_is_an_error() {
    let config = ProverConfig {
        finalization_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let env = TestEnv::with_config(SourceId::Btc, 1, FinalizationMode::Manual, config);
    env.chain.mine_empty(5);

    let err = env.prover.prove_confirmed_block_height_exists(10).await.unwrap_err();

    assert!(matches!(err, ClientError::FinalizationTimeout { round: FIRST_ROUND }));
}

#[tokio::test]
async fn cancellation_abandons_the_wait() {
    let env = TestEnv::new(SourceId::Btc, 1, FinalizationMode::Manual);
    env.chain.mine_empty(5);
    let token = CancellationToken::new();
    let prover = env.prover.clone().with_cancellation(token.clone());

    let flow = tokio::spawn(async move { prover.prove_confirmed_block_height_exists(10).await });
    while env.oracle.submission_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    token.cancel();

    let err = flow.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));

    // The round can still finalize for other waiters.
    assert_eq!(env.oracle.finalize_round(), FIRST_ROUND);
}

#[tokio::test]
async fn manual_finalization_resumes_waiting_flow() {
    let env = TestEnv::new(SourceId::Xrp, 1, FinalizationMode::Manual);
    env.chain.mine_empty(5);

    let finalizer = {
        let oracle = Arc::clone(&env.oracle);
        tokio::spawn(async move {
            while oracle.submission_count() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            oracle.finalize_round()
        })
    };

    let outcome = env.prover.prove_confirmed_block_height_exists(10).await.unwrap();

    assert!(outcome.is_proved());
    assert_eq!(finalizer.await.unwrap(), FIRST_ROUND);
}

mod nonexistence {
    use super::*;

    /// Chain of seven empty blocks ten seconds apart, one confirmation.
    fn env() -> TestEnv {
        let env = TestEnv::new(SourceId::Btc, 1, FinalizationMode::Auto);
        env.chain.mine_empty(7);
        env
    }

    fn overflow_block(outcome: ProofOutcome) -> u64 {
        let proof = outcome.into_proof().expect("nonexistence should be proved");
        let ResponseBody::ReferencedPaymentNonexistence(body) = proof.response.body else {
            panic!("expected nonexistence response");
        };
        body.first_overflow_block_number
    }

    #[tokio::test]
    async fn block_stamped_at_deadline_is_not_overflow() {
        let env = env();
        let deadline = GENESIS_TIMESTAMP + 40;

        let outcome = env
            .prover
            .prove_referenced_payment_nonexistence("carol", REFERENCE, 100, 1, 3, deadline)
            .await
            .unwrap();

        assert_eq!(overflow_block(outcome), 5);
    }

    #[tokio::test]
    async fn block_stamped_after_deadline_is_overflow() {
        let env = env();
        let deadline = GENESIS_TIMESTAMP + 39;

        let outcome = env
            .prover
            .prove_referenced_payment_nonexistence("carol", REFERENCE, 100, 1, 3, deadline)
            .await
            .unwrap();

        assert_eq!(overflow_block(outcome), 4);
    }

    #[tokio::test]
    async fn existing_payment_is_not_proved() {
        let env = TestEnv::new(SourceId::Btc, 1, FinalizationMode::Auto);
        let payment = TransactionBuilder::new()
            .input("dave", 120)
            .output("carol", 100)
            .reference(REFERENCE)
            .build();
        env.chain.mine_empty(1);
        env.chain.mine(vec![payment]);
        env.chain.mine_empty(5);

        let deadline = GENESIS_TIMESTAMP + 30;
        let outcome = env
            .prover
            .prove_referenced_payment_nonexistence("carol", REFERENCE, 100, 1, 3, deadline)
            .await
            .unwrap();
        assert_not_proved(&outcome, ProofStage::Fetched);

        // Too small to count
        let outcome = env
            .prover
            .prove_referenced_payment_nonexistence("carol", REFERENCE, 101, 1, 3, deadline)
            .await
            .unwrap();
        assert!(outcome.is_proved());
    }

    #[tokio::test]
    async fn open_window_has_no_overflow_block() {
        let env = env();

        let err = env
            .prover
            .prove_referenced_payment_nonexistence("carol", REFERENCE, 1, 1, 7, GENESIS_TIMESTAMP)
            .await
            .unwrap_err();

        match err {
            ClientError::OverflowBlockNotFound { deadline_block, chain_height, .. } => {
                assert_eq!(deadline_block, 7);
                assert_eq!(chain_height, 7);
            },
            other => panic!("expected OverflowBlockNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unconfirmed_overflow_block_is_not_found() {
        let env = env();

        let err = env
            .prover
            .prove_referenced_payment_nonexistence("carol", REFERENCE, 1, 1, 6, GENESIS_TIMESTAMP)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::SubjectNotFound { chain_height: 7, .. }));
    }
}
