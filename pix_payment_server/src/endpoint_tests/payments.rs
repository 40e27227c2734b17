use actix_web::{http::StatusCode, test::TestRequest};
use pix_payment_engine::{db_types::PaymentStatus, ForwardError, ForwardResponse};
use pix_processor::ProcessorError;
use serde_json::json;

use super::{
    helpers::{json_body, TestServer},
    mocks::{idle_forwarder, processor_payment, MockForwarder, MockProcessor},
};
use crate::{config::ServerOptions, helpers::IDEMPOTENCY_HEADER};

#[actix_web::test]
async fn generate_pix_creates_and_stores_payment() {
    let mut processor = MockProcessor::new();
    processor
        .expect_create_payment()
        .withf(|charge, key| charge.external_reference == "A1" && key == "retry-42")
        .times(1)
        .returning(|_, _| Ok(processor_payment("PAY1", "pending")));
    let server = TestServer::new(processor, idle_forwarder()).await;
    let req = TestRequest::post()
        .uri("/api/generate-pix")
        .insert_header((IDEMPOTENCY_HEADER, "retry-42"))
        .set_json(json!({"amount": 35.5, "orderId": "A1", "orderData": {"orderId": "A1", "items": []}}));
    let (status, body) = server.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json_body(&body);
    assert_eq!(body["paymentId"], "PAY1");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["qrImage"], "iVBORw0K");
    assert_eq!(body["qrImageFormat"], "png");
    assert_eq!(body["copyPasteCode"], "00020126PIX");
    assert_eq!(body["simulated"], false);

    let (status, body) = server.get("/api/payments/PAY1").await;
    assert_eq!(status, StatusCode::OK);
    let record = json_body(&body);
    assert_eq!(record["orderId"], "A1");
    assert_eq!(record["status"], "pending");
    assert_eq!(record["orderPayload"]["orderId"], "A1");
}

#[actix_web::test]
async fn generate_pix_accepts_legacy_shape() {
    let mut processor = MockProcessor::new();
    processor
        .expect_create_payment()
        .withf(|charge, _| charge.external_reference == "B2" && charge.description == "Pedido #B2")
        .times(1)
        .returning(|_, _| Ok(processor_payment("PAY2", "pending")));
    let server = TestServer::new(processor, idle_forwarder()).await;
    let (status, body) =
        server.post_json("/api/generate-pix", json!({"transaction_amount": 10, "description": "Pedido #B2"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json_body(&body)["paymentId"], "PAY2");
}

#[actix_web::test]
async fn legacy_create_paths_are_aliases() {
    let mut processor = MockProcessor::new();
    processor
        .expect_create_payment()
        .times(2)
        .returning(|charge, _| Ok(processor_payment(&format!("PAY-{}", charge.external_reference), "pending")));
    let server = TestServer::new(processor, idle_forwarder()).await;
    for (path, order) in [("/criar-pagamento", "C1"), ("/api/criar-pagamento", "C2")] {
        let (status, body) = server.post_json(path, json!({"amount": 10, "orderId": order})).await;
        assert_eq!(status, StatusCode::OK, "{path}: {body}");
        assert_eq!(json_body(&body)["paymentId"], format!("PAY-{order}"));
    }
    let (status, _) = server.get("/criar-pagamento").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn generate_pix_rejects_bad_input() {
    let mut processor = MockProcessor::new();
    processor.expect_create_payment().never();
    let server = TestServer::new(processor, idle_forwarder()).await;
    for body in [json!({}), json!({"amount": 0, "orderId": "A1"}), json!({"amount": 10, "orderId": ""})] {
        let (status, response) = server.post_json("/api/generate-pix", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} gave {response}");
        assert!(json_body(&response)["error"].as_str().unwrap().starts_with("Invalid request."));
    }
}

#[actix_web::test]
async fn generate_pix_processor_rejects_credentials() {
    let mut processor = MockProcessor::new();
    processor.expect_create_payment().returning(|_, _| Err(ProcessorError::Unauthorized { status: 401 }));
    let server = TestServer::new(processor, idle_forwarder()).await;
    let (status, _) = server.post_json("/api/generate-pix", json!({"amount": 10, "orderId": "A1"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(server.stored_status("PAY1").await, None);
}

#[actix_web::test]
async fn generate_pix_processor_down() {
    let mut processor = MockProcessor::new();
    processor
        .expect_create_payment()
        .times(1)
        .returning(|_, _| Err(ProcessorError::UpstreamUnavailable("connection refused".into())));
    let server = TestServer::new(processor, idle_forwarder()).await;
    let (status, body) = server.post_json("/api/generate-pix", json!({"amount": 10, "orderId": "A1"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(&body);
    assert_eq!(body["error"], "Payment processor error");
    assert!(body["detail"].as_str().unwrap().contains("connection refused"));
}

#[actix_web::test]
async fn generate_pix_when_simulating() {
    let mut processor = MockProcessor::new();
    processor.expect_create_payment().never();
    let options = ServerOptions { simulate_payments: true, ..Default::default() };
    let server = TestServer::new(processor, idle_forwarder()).await.with_options(options);
    let (status, body) = server.post_json("/api/generate-pix", json!({"amount": 10, "orderId": "A1"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json_body(&body);
    assert!(body["paymentId"].as_str().unwrap().starts_with("DEV-"));
    assert_eq!(body["qrImageFormat"], "svg");
    assert_eq!(body["simulated"], true);
}

#[actix_web::test]
async fn check_payment_answers_final_statuses_locally() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().never();
    let server = TestServer::new(processor, idle_forwarder()).await;
    server.seed_payment("PAY1", PaymentStatus::Rejected).await;
    let (status, body) = server.get("/api/check-payment/PAY1").await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["source"], "local");
}

#[actix_web::test]
async fn check_payment_asks_processor_and_fulfills() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().times(1).returning(|id| Ok(processor_payment(id, "approved")));
    let mut forwarder = MockForwarder::new();
    forwarder.expect_is_configured().return_const(true);
    forwarder
        .expect_forward()
        .withf(|payload| payload["orderId"] == "A1")
        .times(1)
        .returning(|_| Ok(ForwardResponse { status: 200, body: "printed".into() }));
    let server = TestServer::new(processor, forwarder).await;
    server.seed_payment("PAY1", PaymentStatus::Pending).await;
    let (status, body) = server.get("/api/check-payment/PAY1").await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["source"], "upstream");
    assert_eq!(body["statusDetail"], "approved_detail");
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Approved));
}

#[actix_web::test]
async fn check_payment_never_guesses_when_processor_is_down() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().times(1).returning(|_| Err(ProcessorError::UpstreamUnavailable("timeout".into())));
    let server = TestServer::new(processor, idle_forwarder()).await;
    server.seed_payment("PAY1", PaymentStatus::Pending).await;
    let (status, body) = server.get("/api/check-payment/PAY1").await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["source"], "local");
    assert!(body["error"].as_str().unwrap().contains("timeout"));
    assert_eq!(server.stored_status("PAY1").await, Some(PaymentStatus::Pending));
}

#[actix_web::test]
async fn check_payment_for_simulated_payments() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().never();
    let server = TestServer::new(processor, idle_forwarder()).await;
    let (status, body) = server.get("/api/check-payment/DEV-unknown").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"status": "pending", "simulated": true}));
}

#[actix_web::test]
async fn payment_status_always_asks_processor() {
    let mut processor = MockProcessor::new();
    processor.expect_fetch_payment().times(1).returning(|id| Ok(processor_payment(id, "rejected")));
    let server = TestServer::new(processor, idle_forwarder()).await;
    server.seed_payment("PAY1", PaymentStatus::Rejected).await;
    let (status, body) = server.get("/api/payment-status/PAY1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"status": "rejected", "statusDetail": "rejected_detail"}));
}

#[actix_web::test]
async fn payment_record_not_found() {
    let server = TestServer::new(MockProcessor::new(), idle_forwarder()).await;
    let (status, _) = server.get("/api/payments/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn print_order_is_proxied() {
    let mut forwarder = MockForwarder::new();
    forwarder
        .expect_forward()
        .withf(|payload| payload["orderId"] == "A9")
        .times(1)
        .returning(|_| Ok(ForwardResponse { status: 200, body: r#"{"queued":true}"#.into() }));
    let server = TestServer::new(MockProcessor::new(), forwarder).await;
    let (status, body) = server.post_json("/api/print-order", json!({"orderId": "A9"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"ok": true, "proxied": {"queued": true}}));
}

#[actix_web::test]
async fn print_order_keeps_text_responses() {
    let mut forwarder = MockForwarder::new();
    forwarder.expect_forward().returning(|_| Ok(ForwardResponse { status: 200, body: "OK".into() }));
    let server = TestServer::new(MockProcessor::new(), forwarder).await;
    let (status, body) = server.post_json("/api/print-order", json!({"orderId": "A9"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"ok": true, "proxied": "OK"}));
}

#[actix_web::test]
async fn print_order_failures() {
    let mut forwarder = MockForwarder::new();
    let mut calls = 0;
    forwarder.expect_forward().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(ForwardError::NotConfigured)
        } else {
            Err(ForwardError::Unreachable("connection refused".into()))
        }
    });
    let server = TestServer::new(MockProcessor::new(), forwarder).await;
    let (status, body) = server.post_json("/api/print-order", json!({"orderId": "A9"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error"], "The print webhook is not configured on the server");
    let (status, body) = server.post_json("/api/print-order", json!({"orderId": "A9"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(&body)["detail"], "connection refused");
}
