//! Webhook signature middleware for Actix Web.
//!
//! The payment processor signs each notification with an HMAC-SHA256 of the raw request body, keyed with the shared
//! webhook secret (`PIX_WEBHOOK_SECRET`). The signature arrives in one of the headers listed in
//! [`SIGNATURE_HEADERS`], either as `ts=<unix>,v1=<hex>`, `sha256=<hex>` or a bare hex digest.
//!
//! * No secret configured: every request is let through.
//! * Secret configured, no signature header: 400.
//! * Signature mismatch: 401, unless the server runs outside production with the permissive policy and the payload
//!   does not claim to be live. Those requests are let through with a [`SignatureWaived`] marker in the request
//!   extensions.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorUnauthorized},
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use pix_common::{
    signature::{verify_signature, SIGNATURE_HEADERS},
    Secret,
};
use serde_json::Value;

use crate::config::SignaturePolicy;

/// Inserted into the request extensions when a bad signature was tolerated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureWaived;

pub struct WebhookSignatureFactory {
    secret: Secret<String>,
    policy: SignaturePolicy,
    production: bool,
}

impl WebhookSignatureFactory {
    pub fn new(secret: Secret<String>, policy: SignaturePolicy, production: bool) -> Self {
        Self { secret, policy, production }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService {
            secret: self.secret.clone(),
            policy: self.policy,
            production: self.production,
            service: Rc::new(service),
        }))
    }
}

pub struct WebhookSignatureService<S> {
    secret: Secret<String>,
    policy: SignaturePolicy,
    production: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        let policy = self.policy;
        let production = self.production;
        Box::pin(async move {
            if secret.is_empty() {
                trace!("🔐️ No webhook secret is configured. Skipping signature check.");
                return service.call(req).await;
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let signature = SIGNATURE_HEADERS
                .iter()
                .find_map(|name| req.headers().get(*name))
                .and_then(|v| v.to_str().ok())
                .map(String::from)
                .ok_or_else(|| {
                    warn!("🔐️ No signature found on webhook request. Denying access.");
                    ErrorBadRequest("Missing signature")
                })?;
            if verify_signature(secret.reveal(), data.as_ref(), &signature) {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(data));
                return service.call(req).await;
            }
            let prefix = signature.chars().take(12).collect::<String>();
            let live = claims_live_mode(data.as_ref());
            if production || live || policy == SignaturePolicy::Strict {
                warn!("🔐️ Invalid webhook signature ({prefix}…, live_mode: {live}). Denying access.");
                return Err(ErrorUnauthorized("Invalid signature"));
            }
            warn!(
                "🚨️ Invalid webhook signature ({prefix}…) on a sandbox notification. Letting it through because the \
                 signature policy is permissive."
            );
            req.extensions_mut().insert(SignatureWaived);
            req.set_payload(bytes_to_payload(data));
            service.call(req).await
        })
    }
}

fn claims_live_mode(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body).ok().and_then(|v| v["live_mode"].as_bool()).unwrap_or(false)
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
