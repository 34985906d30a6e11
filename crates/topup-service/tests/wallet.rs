//! Wallet and sponsorship integration tests.

mod common;

use common::{user_header, TestHarness};
use serde_json::{json, Value};

use topup_core::UserId;
use topup_service::audit::{ACTION_USER_SPONSOR, STATUS_SUCCESS};

#[tokio::test]
async fn sponsorship_moves_credits() {
    let harness = TestHarness::new().await;
    let payee = UserId::generate();
    harness.ledger.fund(harness.user_id, 500).await;
    let (name, value) = harness.user_header();

    let response = harness
        .server
        .post("/v1/wallet/sponsor")
        .add_header(name, value)
        .json(&json!({ "payee": payee, "amount": 120, "description": "thanks" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["result"]["award"], 380);
    let txn = body["result"]["txn"].as_str().unwrap().to_string();

    let (name, value) = user_header(payee);
    let received: Value = harness
        .server
        .get("/v1/wallet")
        .add_header(name, value)
        .await
        .json();
    assert_eq!(received["result"]["income"], 120);
    assert_eq!(received["result"]["level"], 2);

    let entries = harness.audit.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, ACTION_USER_SPONSOR);
    assert_eq!(entry.status, STATUS_SUCCESS);
    assert_eq!(entry.uid, harness.user_id);
    assert_eq!(entry.payload.kind, "transaction");
    assert_eq!(entry.payload.id, txn);
    assert_eq!(entry.payload.payer, harness.user_id);
    assert_eq!(entry.payload.payee, Some(payee));
    assert_eq!(entry.payload.amount, 120);
}

#[tokio::test]
async fn sponsorship_amount_out_of_range_is_rejected() {
    let harness = TestHarness::new().await;
    harness.ledger.fund(harness.user_id, 5_000_000).await;
    let payee = UserId::generate();

    for amount in [0, -1, 1_000_001] {
        let (name, value) = harness.user_header();
        let response = harness
            .server
            .post("/v1/wallet/sponsor")
            .add_header(name, value)
            .json(&json!({ "payee": payee, "amount": amount }))
            .await;

        response.assert_status_bad_request();
    }
    assert_eq!(harness.ledger.calls(), 0);
    assert!(harness.audit.entries().is_empty());
}

#[tokio::test]
async fn sponsoring_yourself_is_rejected() {
    let harness = TestHarness::new().await;
    harness.ledger.fund(harness.user_id, 100).await;
    let (name, value) = harness.user_header();

    let response = harness
        .server
        .post("/v1/wallet/sponsor")
        .add_header(name, value)
        .json(&json!({ "payee": harness.user_id, "amount": 10 }))
        .await;

    response.assert_status_bad_request();
    assert_eq!(harness.ledger.calls(), 0);
}

#[tokio::test]
async fn sponsorship_beyond_balance_is_rejected() {
    let harness = TestHarness::new().await;
    harness.ledger.fund(harness.user_id, 50).await;
    let (name, value) = harness.user_header();

    let response = harness
        .server
        .post("/v1/wallet/sponsor")
        .add_header(name, value)
        .json(&json!({ "payee": UserId::generate(), "amount": 51 }))
        .await;

    response.assert_status_bad_request();
    assert!(harness.audit.entries().is_empty());
}

#[tokio::test]
async fn sponsorship_without_identity_is_unauthorized() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/v1/wallet/sponsor")
        .json(&json!({ "payee": UserId::generate(), "amount": 10 }))
        .await;

    response.assert_status_unauthorized();
    assert_eq!(harness.ledger.calls(), 0);
}
