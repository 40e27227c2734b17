use actix_web::http::StatusCode;
use serde_json::json;

use super::{
    helpers::{json_body, TestServer},
    mocks::{idle_forwarder, MockProcessor},
};
use crate::config::ServerOptions;

async fn server(options: ServerOptions) -> TestServer {
    let mut processor = MockProcessor::new();
    processor.expect_create_payment().never();
    processor.expect_fetch_payment().never();
    TestServer::new(processor, idle_forwarder()).await.with_options(options)
}

#[actix_web::test]
async fn dev_endpoints_are_closed_in_production() {
    let server = server(ServerOptions { production: true, ..Default::default() }).await;
    let (status, _) = server.post_json("/api/generate-pix-dev", json!({"amount": 5, "orderId": "A1"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server.post_json("/api/dev-approve/DEV-1", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn dev_endpoints_can_be_opened_in_production() {
    let server = server(ServerOptions { production: true, allow_dev_endpoints: true, ..Default::default() }).await;
    let (status, body) = server.post_json("/api/generate-pix-dev", json!({"amount": 5, "orderId": "A1"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[actix_web::test]
async fn simulated_payment_lifecycle() {
    let server = server(ServerOptions::default()).await;
    let (status, body) = server.post_json("/api/generate-pix-dev", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json_body(&body);
    let id = body["paymentId"].as_str().unwrap().to_string();
    assert!(id.starts_with("DEV-"));
    assert_eq!(body["status"], "pending");
    assert_eq!(body["simulated"], true);
    assert!(!body["copyPasteCode"].as_str().unwrap().is_empty());

    let (status, body) = server.get(&format!("/api/check-payment/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"status": "pending", "simulated": true}));

    let (status, body) = server.post_json(&format!("/api/dev-approve/{id}"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"ok": true, "id": id.as_str(), "status": "approved"}));

    let (status, body) = server.get(&format!("/api/check-payment/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"status": "approved", "simulated": true}));
}

#[actix_web::test]
async fn dev_approve_rejects_unknown_payments() {
    let server = server(ServerOptions::default()).await;
    let (status, _) = server.post_json("/api/dev-approve/12345", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.post_json("/api/dev-approve/DEV-missing", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
