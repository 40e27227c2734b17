use actix_web::{http::StatusCode, test::TestRequest};
use pix_common::signature::signature_header;
use pix_payment_engine::{db_types::PaymentStatus, ForwardResponse};
use pix_processor::ProcessorError;
use serde_json::{json, Value};

use super::{
    helpers::{json_body, TestServer},
    mocks::{idle_forwarder, processor_payment, MockForwarder, MockProcessor},
};
use crate::data_objects::JsonResponse;

const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

fn notification(id: &str) -> Value {
    json!({"action": "payment.updated", "type": "payment", "data": {"id": id}, "live_mode": true})
}

fn message(body: &str) -> (bool, String) {
    let response = serde_json::from_str::<JsonResponse>(body).unwrap_or_else(|e| panic!("{e}: {body}"));
    (response.success, response.message)
}

fn offline_processor() -> MockProcessor {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().returning(|_| Err(ProcessorError::UpstreamUnavailable("timeout".into())));
    processor
}

#[actix_web::test]
async fn approved_payment_is_recorded_and_fulfilled() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().withf(|id| id == "PAY1").returning(|id| Ok(processor_payment(id, "approved")));
    let mut forwarder = MockForwarder::new();
    forwarder.expect_is_configured().return_const(true);
    forwarder.expect_forward().times(1).returning(|_| Ok(ForwardResponse { status: 200, body: "ok".into() }));
    let server = TestServer::new(processor, forwarder).await;
    server.seed_payment("PAY1", PaymentStatus::Pending).await;

    let (status, body) = server.post_json("/api/webhook", notification("PAY1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "ok-approved".to_string()));
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Approved));

    // Re-delivery of the same notification must not print the order again
    let (status, body) = server.post_json("/api/webhook", notification("PAY1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "ok-approved".to_string()));
}

#[actix_web::test]
async fn final_statuses_are_not_overwritten() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().returning(|id| Ok(processor_payment(id, "cancelled")));
    let mut forwarder = MockForwarder::new();
    forwarder.expect_is_configured().return_const(true);
    forwarder.expect_forward().never();
    let server = TestServer::new(processor, forwarder).await;
    server.seed_payment("PAY1", PaymentStatus::Rejected).await;
    let (status, body) = server.post_json("/api/webhook", notification("PAY1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "ok-status-ignored".to_string()));
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Rejected));
}

#[actix_web::test]
async fn expired_tells_us_nothing() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().returning(|id| Ok(processor_payment(id, "expired")));
    let server = TestServer::new(processor, idle_forwarder()).await;
    server.seed_payment("PAY1", PaymentStatus::Pending).await;
    let (status, body) = server.post_json("/api/webhook", notification("PAY1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "ok-status-ignored".to_string()));
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Pending));
}

#[actix_web::test]
async fn unconfirmed_notifications_are_accepted_for_retry() {
    let server = TestServer::new(offline_processor(), idle_forwarder()).await;
    server.seed_payment("PAY1", PaymentStatus::Pending).await;
    let (status, body) = server.post_json("/api/webhook", notification("PAY1")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(message(&body), (false, "accepted-awaiting-confirmation".to_string()));
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Pending));
}

#[actix_web::test]
async fn unconfirmed_but_approved_earlier() {
    let server = TestServer::new(offline_processor(), idle_forwarder()).await;
    server.seed_payment("PAY1", PaymentStatus::Approved).await;
    let (status, body) = server.post_json("/api/webhook", notification("PAY1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "ok-stored-approved".to_string()));
}

#[actix_web::test]
async fn notifications_that_need_no_work() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().never();
    let server = TestServer::new(processor, idle_forwarder()).await;

    let (status, body) = server.post_json("/api/webhook", json!({"action": "ping"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "no-op".to_string()));

    let sandbox = json!({"data": {"id": "PAY1"}, "live_mode": false});
    let (status, body) = server.post_json("/api/webhook", sandbox).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "test-webhook-ignored".to_string()));

    let req = TestRequest::post()
        .uri("/api/webhook")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json");
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), (false, "Invalid JSON".to_string()));
}

#[actix_web::test]
async fn malformed_payment_ids_are_rejected() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().never();
    let server = TestServer::new(processor, idle_forwarder()).await;
    for id in ["../users/me", "PAY1?access_token=x", "PAY 1"] {
        let (status, body) = server.post_json("/api/webhook", notification(id)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{id}");
        assert_eq!(message(&body), (false, "Invalid payment id".to_string()));
    }
    let req = TestRequest::post().uri("/api/webhook?id=..%2Fusers%2Fme").set_json(json!({"action": "x"}));
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(server.stored_status("../users/me").await, None);
}

#[actix_web::test]
async fn payment_id_from_query_string() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().withf(|id| id == "PAY7").times(1).returning(|id| Ok(processor_payment(id, "pending")));
    let server = TestServer::new(processor, idle_forwarder()).await;
    server.seed_payment("PAY7", PaymentStatus::Pending).await;
    let req = TestRequest::post().uri("/api/webhook?data.id=PAY7&type=payment").set_json(json!({"action": "x"}));
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message(&body), (true, "ok-pending".to_string()));
}

#[actix_web::test]
async fn signed_webhooks() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().times(1).returning(|id| Ok(processor_payment(id, "rejected")));
    let server = TestServer::new(processor, idle_forwarder()).await.with_webhook_secret(WEBHOOK_SECRET);
    server.seed_payment("PAY1", PaymentStatus::Pending).await;
    let body = notification("PAY1").to_string();

    let req = TestRequest::post().uri("/api/webhook").set_payload(body.clone());
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let forged = signature_header("not the secret", body.as_bytes(), 1_718_000_000);
    let req = TestRequest::post().uri("/api/webhook").insert_header(("x-signature", forged)).set_payload(body.clone());
    let (status, _) = server.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Pending));

    let signature = signature_header(WEBHOOK_SECRET, body.as_bytes(), 1_718_000_000);
    let req = TestRequest::post().uri("/api/webhook").insert_header(("x-signature", signature)).set_payload(body);
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["message"], "ok-rejected");
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Rejected));
}
