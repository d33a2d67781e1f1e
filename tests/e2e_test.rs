//! End-to-end tests for complete attestation workflows.
//!
//! Exercises the full system from ledger lookup through submission,
//! finalization and proof retrieval, then checks every proof against the
//! round's published Merkle root.

use std::{sync::Arc, time::Duration};

use alloy_primitives::B256;
use anyhow::{Context, Result};
use attestor::{
    attestor_client::{ProofOutcome, SourceLedger},
    attestor_core::{
        decode_request, equals_request, response_hash, verify_attestation, MerkleTree, SourceId,
    },
    build_prover, AttestorConfig,
};
use attestor_testing::{
    expected_response, FinalizationMode, TestEnv, TransactionBuilder, GENESIS_TIMESTAMP,
};
use serde_json::json;
use tokio::task::JoinSet;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

/// The golden path: every attestation type proved in one round and verified
/// against its root.
#[tokio::test]
async fn golden_round_proves_all_attestation_types() -> Result<()> {
    let env = TestEnv::new(SourceId::Btc, 2, FinalizationMode::Manual);
    let reference = B256::repeat_byte(0x11);
    let payment = TransactionBuilder::new()
        .input("alice", 500)
        .output("bob", 450)
        .output("alice", 40)
        .reference(reference)
        .build();
    env.chain.mine_empty(3);
    env.chain.mine(vec![payment.clone()]);
    env.chain.mine_empty(8);

    let prover = env.prover.clone();
    let payment_hash = payment.hash;
    let mut flows = JoinSet::new();
    {
        let prover = prover.clone();
        flows.spawn(async move { prover.prove_payment(payment_hash, None, Some("bob")).await });
    }
    {
        let prover = prover.clone();
        flows.spawn(async move {
            prover.prove_balance_decreasing_transaction(payment_hash, Some("alice")).await
        });
    }
    {
        let prover = prover.clone();
        flows.spawn(async move { prover.prove_confirmed_block_height_exists(30).await });
    }
    {
        let prover = prover.clone();
        flows.spawn(async move {
            prover
                .prove_referenced_payment_nonexistence(
                    "carol",
                    reference,
                    1,
                    1,
                    5,
                    GENESIS_TIMESTAMP + 55,
                )
                .await
        });
    }

    while env.oracle.submission_count() < 4 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let round = env.oracle.finalize_round();
    let root = env.oracle.merkle_root(round).context("round should have a root")?;

    let mut proved = 0;
    while let Some(joined) = flows.join_next().await {
        let proof = joined?.context("flow should not error")?.into_proof().context("not proved")?;
        assert_eq!(proof.request_id.round, round);
        assert!(verify_attestation(&proof.request, &proof.response, root)?);

        let submitted = decode_request(&proof.request_id.data)?;
        assert!(equals_request(&submitted, &proof.request));
        proved += 1;
    }
    assert_eq!(proved, 4);
    Ok(())
}

/// Proofs of one round do not verify against another round's root.
#[tokio::test]
async fn proofs_are_bound_to_their_round() -> Result<()> {
    let env = TestEnv::new(SourceId::Ltc, 1, FinalizationMode::Auto);
    env.chain.mine_empty(10);

    let first = env.prover.prove_confirmed_block_height_exists(20).await?;
    env.chain.mine_empty(1);
    let second = env.prover.prove_confirmed_block_height_exists(20).await?;

    let (Some(first), Some(second)) = (first.into_proof(), second.into_proof()) else {
        anyhow::bail!("both flows should be proved");
    };
    assert_ne!(first.request_id.round, second.request_id.round);

    let second_root = env.oracle.merkle_root(second.request_id.round).context("no root")?;
    assert!(verify_attestation(&second.request, &second.response, second_root)?);
    assert!(!verify_attestation(&first.request, &first.response, second_root)?);
    Ok(())
}

/// The configured HTTP client drives a full flow against a provider.
#[tokio::test]
async fn configured_prover_talks_to_http_provider() -> Result<()> {
    let env = TestEnv::new(SourceId::Xrp, 1, FinalizationMode::Auto);
    let tx = TransactionBuilder::new().input("rAlice", 25).output("rBob", 25).build();
    env.chain.mine(vec![tx.clone()]);
    env.chain.mine_empty(1);

    // The provider's answer is what the mock network would vote for, alone
    // in its round so the root equals the leaf.
    let request = attestor_testing::fixtures::payment_request(SourceId::Xrp, tx.hash, 1, 0, 0);
    let response = expected_response(&env.chain, &request)
        .context("payment should hold")?
        .with_round(12);
    let leaf = response_hash(&request, &response, None)?.complete().context("incomplete")?;
    let tree = MerkleTree::build([leaf]);
    let response = response.with_merkle_proof(tree.proof(0).context("no proof")?);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK", "round": 12 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/round/12$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "round": 12, "finalized": false })),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/round/12$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "round": 12, "finalized": true })),
        )
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/proof"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "finalized": true, "result": serde_json::to_value(&response)? })),
        )
        .mount(&server)
        .await;

    let config = AttestorConfig {
        oracle_url: server.uri(),
        poll_base_delay_ms: 5,
        poll_max_delay_ms: 10,
        poll_jitter_factor: 0.0,
        finalization_timeout_secs: 5,
        ..Default::default()
    };
    config.validate()?;
    let ledger: Arc<dyn SourceLedger> = env.chain.clone();
    let prover = build_prover(&config, ledger)?;

    let outcome = prover.prove_payment(tx.hash, None, None).await?;
    let proof = match outcome {
        ProofOutcome::Proved(proof) => proof,
        other => anyhow::bail!("expected proof, got {other:?}"),
    };
    assert_eq!(proof.response, response);
    assert!(verify_attestation(&proof.request, &proof.response, tree.root().context("no root")?)?);
    Ok(())
}

/// A provider that rejects the request ends the flow without an error.
#[tokio::test]
async fn provider_rejection_is_not_proved() -> Result<()> {
    let env = TestEnv::new(SourceId::Algo, 0, FinalizationMode::Auto);
    env.chain.mine_empty(4);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "REJECTED" })))
        .mount(&server)
        .await;

    let config = AttestorConfig { oracle_url: server.uri(), ..Default::default() };
    let prover = build_prover(&config, env.chain.clone())?;

    let outcome = prover.prove_confirmed_block_height_exists(10).await?;
    assert!(!outcome.is_proved());
    Ok(())
}
