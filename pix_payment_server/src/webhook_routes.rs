//! Processor webhook handler.
//!
//! By the time a request reaches this handler, its signature has been checked by
//! [`crate::middleware::WebhookSignatureFactory`]. The notification itself is never trusted for the payment status:
//! it only tells us which payment to look up.
//!
//! The processor keeps re-delivering notifications until it gets a 2xx response, so every outcome that a retry
//! can't improve is answered with 200. 202 means "received, but the processor could not confirm the status yet".
use std::collections::HashMap;

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use log::*;
use pix_payment_engine::{
    db_types::PaymentId,
    flow_objects::{Reconciliation, StatusSource},
    OrderForwarder,
    PaymentFlowApi,
    PaymentRecordStore,
};
use pix_processor::{data_objects::is_plain_payment_id, PaymentProcessor};
use serde_json::Value;

use crate::{data_objects::JsonResponse, middleware::SignatureWaived, route};

route!(processor_webhook => Post "" impl PaymentRecordStore, PaymentProcessor, OrderForwarder);
pub async fn processor_webhook<B, P, F>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B, P, F>>,
) -> HttpResponse
where
    B: PaymentRecordStore,
    P: PaymentProcessor,
    F: OrderForwarder,
{
    trace!("🪝️ Received webhook request: {}", req.uri());
    let notification = match serde_json::from_slice::<Value>(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("🪝️ Webhook body is not valid JSON. {e}");
            return HttpResponse::BadRequest().json(JsonResponse::failure("Invalid JSON"));
        },
    };
    let Some(id) = payment_id_from(&notification, req.query_string()) else {
        debug!("🪝️ Notification does not refer to a payment. Nothing to do. {notification}");
        return HttpResponse::Ok().json(JsonResponse::success("no-op"));
    };
    if !is_plain_payment_id(id.as_str()) {
        warn!("🪝️ Notification refers to a malformed payment id '{id}'. Rejected.");
        return HttpResponse::BadRequest().json(JsonResponse::failure("Invalid payment id"));
    }
    if notification["live_mode"] == Value::Bool(false) {
        info!("🪝️ Sandbox notification for payment {id}. Acknowledged and ignored.");
        return HttpResponse::Ok().json(JsonResponse::success("test-webhook-ignored"));
    }
    if req.extensions().get::<SignatureWaived>().is_some() {
        warn!("🪝️ Processing notification for payment {id} even though its signature did not match.");
    }
    match api.fetch_and_reconcile(&id, StatusSource::Webhook).await {
        Ok(Reconciliation::Applied { record, advanced, .. }) => {
            info!("🪝️ Payment {id} is {} (changed: {advanced})", record.status);
            HttpResponse::Ok().json(JsonResponse::success(format!("ok-{}", record.status)))
        },
        Ok(Reconciliation::Discarded { observed, .. }) => {
            info!("🪝️ Processor status '{observed}' for payment {id} was not applied");
            HttpResponse::Ok().json(JsonResponse::success("ok-status-ignored"))
        },
        Ok(Reconciliation::Unconfirmed { record: Some(record), .. }) if record.status.is_approved() => {
            info!("🪝️ Payment {id} could not be confirmed, but was approved earlier");
            HttpResponse::Ok().json(JsonResponse::success("ok-stored-approved"))
        },
        Ok(Reconciliation::Unconfirmed { reason, .. }) => {
            warn!("🪝️ Payment {id} could not be confirmed with the processor. {reason}");
            HttpResponse::Accepted().json(JsonResponse::failure("accepted-awaiting-confirmation"))
        },
        Err(e) => {
            error!("🪝️ Could not reconcile payment {id}. {e}");
            HttpResponse::Accepted().json(JsonResponse::failure("accepted-but-not-processed"))
        },
    }
}

/// The payment id is in `data.id` or `id`, as a string or a number. Some notifications only carry it in the query
/// string (`?data.id=..` or `?id=..`).
fn payment_id_from(notification: &Value, query: &str) -> Option<PaymentId> {
    let from_body = [&notification["data"]["id"], &notification["id"]].into_iter().find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    from_body
        .or_else(|| {
            let params = web::Query::<HashMap<String, String>>::from_query(query).ok()?.into_inner();
            params.get("data.id").or_else(|| params.get("id")).filter(|s| !s.trim().is_empty()).cloned()
        })
        .map(PaymentId::from)
}
