//! JSON command session tests

use std::sync::Arc;

use serde_json::{json, Value};

use labpoints::command::{Response, Session};
use labpoints::{Identity, MemoryRegistry, PointsEngine};

fn session() -> Session {
    let registry = Arc::new(MemoryRegistry::new());
    let engine = Arc::new(PointsEngine::new(registry.clone()));
    Session::new(engine, registry)
}

async fn send(session: &Session, command: Value) -> Value {
    let response = session.handle_line(&command.to_string()).await;
    serde_json::to_value(&response).unwrap()
}

/// Registers an admin, a tutor with funds and an approved student
async fn cohort(session: &Session) -> (Identity, Identity, Identity) {
    let admin = Identity::new();
    let tutor = Identity::new();
    let student = Identity::new();

    for (id, name) in [(admin, "Admin"), (tutor, "Tutor"), (student, "Alice")] {
        let response = send(
            session,
            json!({ "type": "register_participant", "id": id, "name": name }),
        )
        .await;
        assert_eq!(response["type"], "participant");
    }
    send(
        session,
        json!({ "type": "grant_capability", "id": admin, "capability": "admin" }),
    )
    .await;
    send(
        session,
        json!({ "type": "grant_capability", "id": tutor, "capability": "approve" }),
    )
    .await;
    let response = send(
        session,
        json!({ "type": "approve_participant", "id": student }),
    )
    .await;
    assert_eq!(response["participant"]["approved"], true);

    let engine_id = session.engine().engine_identity();
    send(
        session,
        json!({ "type": "mint", "caller": tutor, "to": tutor, "amount": 1000 }),
    )
    .await;
    send(
        session,
        json!({ "type": "approve_allowance", "caller": tutor, "spender": engine_id, "amount": 500 }),
    )
    .await;

    (admin, tutor, student)
}

#[tokio::test]
async fn test_request_and_fulfill_flow() {
    let session = session();
    let (_, tutor, student) = cohort(&session).await;

    let response = send(
        &session,
        json!({ "type": "request_points", "caller": student, "amount": 100, "description": "D" }),
    )
    .await;
    assert_eq!(response["type"], "request_created");
    let request_id = response["request_id"].as_u64().unwrap();

    let response = send(
        &session,
        json!({ "type": "fulfill_request", "caller": tutor, "request_id": request_id }),
    )
    .await;
    assert_eq!(response["type"], "request");
    assert_eq!(response["request"]["status"], "approved");
    assert_eq!(response["request"]["resolved_by"], json!(tutor));

    let response = send(&session, json!({ "type": "balance", "account": student })).await;
    assert_eq!(response["balance"], 100);

    let response = send(&session, json!({ "type": "total_supply" })).await;
    assert_eq!(response["total_supply"], 1000);
}

#[tokio::test]
async fn test_lab_claim_flow() {
    let session = session();
    let (admin, tutor, student) = cohort(&session).await;

    let response = send(
        &session,
        json!({ "type": "set_reward", "caller": admin, "lab_id": "intro", "amount": 20 }),
    )
    .await;
    assert_eq!(response["type"], "ok");

    let response = send(&session, json!({ "type": "list_labs" })).await;
    assert_eq!(response["labs"], json!([{ "lab_id": "intro", "reward": 20 }]));

    send(
        &session,
        json!({ "type": "set_reward", "caller": admin, "lab_id": "retired", "amount": 0 }),
    )
    .await;
    let response = send(&session, json!({ "type": "get_reward", "lab_id": "retired" })).await;
    assert_eq!(response["reward"], 0);
    assert_eq!(response["configured"], true);
    let response = send(&session, json!({ "type": "get_reward", "lab_id": "unknown" })).await;
    assert_eq!(response["configured"], false);

    let response = send(
        &session,
        json!({ "type": "claim_lab", "caller": student, "lab_id": "retired", "description": "done" }),
    )
    .await;
    assert_eq!(response["kind"], "not_found");

    let response = send(
        &session,
        json!({ "type": "claim_lab", "caller": student, "lab_id": "intro", "description": "done" }),
    )
    .await;
    let request_id = response["request_id"].as_u64().unwrap();

    let response = send(
        &session,
        json!({ "type": "claim_lab", "caller": student, "lab_id": "intro", "description": "again" }),
    )
    .await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["kind"], "already_completed");

    send(
        &session,
        json!({ "type": "reject_request", "caller": tutor, "request_id": request_id }),
    )
    .await;

    let response = send(&session, json!({ "type": "account_status", "account": student })).await;
    assert_eq!(response["type"], "account");
    assert_eq!(response["completed_labs"], json!([]));
    assert_eq!(response["frozen"], false);
}

#[tokio::test]
async fn test_list_requests_filters() {
    let session = session();
    let (_, tutor, student) = cohort(&session).await;

    for amount in [10, 20] {
        send(
            &session,
            json!({ "type": "request_points", "caller": student, "amount": amount, "description": "x" }),
        )
        .await;
    }
    send(
        &session,
        json!({ "type": "reject_request", "caller": tutor, "request_id": 1 }),
    )
    .await;

    let response = send(&session, json!({ "type": "list_requests" })).await;
    assert_eq!(response["requests"].as_array().unwrap().len(), 2);

    let response = send(
        &session,
        json!({ "type": "list_requests", "requester": student, "pending_only": true }),
    )
    .await;
    let requests = response["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["id"], 2);

    let response = send(
        &session,
        json!({ "type": "list_requests", "requester": tutor }),
    )
    .await;
    assert_eq!(response["requests"], json!([]));
}

#[tokio::test]
async fn test_batch_failure_reports_kind() {
    let session = session();
    let (_, tutor, student) = cohort(&session).await;

    for amount in [300, 300] {
        send(
            &session,
            json!({ "type": "request_points", "caller": student, "amount": amount, "description": "x" }),
        )
        .await;
    }

    let response = send(
        &session,
        json!({ "type": "batch_fulfill", "caller": tutor, "request_ids": [1, 2] }),
    )
    .await;
    assert_eq!(response["type"], "error");
    assert_eq!(response["kind"], "insufficient_allowance");

    let response = send(&session, json!({ "type": "get_request", "request_id": 1 })).await;
    assert_eq!(response["request"]["status"], "pending");

    let response = send(
        &session,
        json!({ "type": "batch_reject", "caller": tutor, "request_ids": [1, 2] }),
    )
    .await;
    assert_eq!(response["type"], "requests");
    assert_eq!(response["requests"][1]["status"], "rejected");
}

#[tokio::test]
async fn test_unauthorized_and_malformed_commands() {
    let session = session();
    let (_, _, student) = cohort(&session).await;

    let response = send(
        &session,
        json!({ "type": "mint", "caller": student, "to": student, "amount": 5 }),
    )
    .await;
    assert_eq!(response["kind"], "unauthorized");

    let response = send(&session, json!({ "type": "launch_rockets" })).await;
    assert_eq!(response["kind"], "invalid_argument");

    let response = send(
        &session,
        json!({ "type": "request_points", "caller": "not-a-uuid", "amount": 5, "description": "x" }),
    )
    .await;
    assert_eq!(response["kind"], "invalid_argument");

    let response = session.handle_line("").await;
    assert!(response.is_error());
}

#[tokio::test]
async fn test_freeze_via_commands() {
    let session = session();
    let (_, tutor, student) = cohort(&session).await;

    let response = send(
        &session,
        json!({ "type": "freeze", "caller": tutor, "account": student }),
    )
    .await;
    assert_eq!(response["type"], "ok");

    let response = send(
        &session,
        json!({ "type": "transfer", "caller": tutor, "to": student, "amount": 1 }),
    )
    .await;
    assert_eq!(response["kind"], "frozen_account");

    let response = send(
        &session,
        json!({ "type": "freeze", "caller": tutor, "account": student }),
    )
    .await;
    assert_eq!(response["kind"], "already_frozen");

    let response = send(
        &session,
        json!({ "type": "unfreeze", "caller": tutor, "account": student }),
    )
    .await;
    assert_eq!(response["type"], "ok");

    let response = send(
        &session,
        json!({ "type": "transfer", "caller": tutor, "to": student, "amount": 1 }),
    )
    .await;
    assert_eq!(response["type"], "ok");
    assert!(!matches!(
        session
            .handle_line(&json!({ "type": "balance", "account": student }).to_string())
            .await,
        Response::Error { .. }
    ));
}

#[test]
fn test_session_outside_async_context() {
    let session = session();
    let response = tokio_test::block_on(session.handle_line(r#"{ "type": "total_supply" }"#));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "type": "total_supply", "total_supply": 0 })
    );
}
