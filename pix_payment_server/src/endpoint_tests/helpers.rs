use std::time::Duration;

use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use log::debug;
use pix_common::{Cents, Secret};
use pix_payment_engine::{
    db_types::{NewPaymentRecord, PaymentId, PaymentStatus, StatusEvidence},
    events::{EventHandlers, EventHooks},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    PaymentFlowApi,
    PaymentRecordStore,
    SimulationApi,
    SqliteDatabase,
};
use pix_processor::RetryPolicy;
use serde_json::{json, Value};

use super::mocks::{MockForwarder, MockProcessor};
use crate::{
    config::{ServerOptions, SignaturePolicy},
    middleware::WebhookSignatureFactory,
    routes::{
        dev_approve,
        generate_pix_dev,
        CheckPaymentRoute,
        GeneratePixRoute,
        PaymentRecordRoute,
        PaymentStatusRoute,
        PrintOrderRoute,
    },
    webhook_routes::ProcessorWebhookRoute,
};

pub type TestApi = PaymentFlowApi<SqliteDatabase, MockProcessor, MockForwarder>;

/// Everything the handlers pull out of the app data, backed by a fresh database.
pub struct TestServer {
    pub api: web::Data<TestApi>,
    pub simulation: web::Data<SimulationApi>,
    pub options: ServerOptions,
    pub webhook_secret: String,
}

impl TestServer {
    pub async fn new(processor: MockProcessor, forwarder: MockForwarder) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let handlers = EventHandlers::new(16, EventHooks::default());
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let fast_retries = RetryPolicy { attempts: 3, initial_backoff: Duration::from_millis(1) };
        let api = PaymentFlowApi::new(db, processor, forwarder, producers.clone())
            .with_retry_policy(fast_retries)
            .with_email_domain("test.invalid");
        Self {
            api: web::Data::new(api),
            simulation: web::Data::new(SimulationApi::new(producers)),
            options: ServerOptions::default(),
            webhook_secret: String::new(),
        }
    }

    pub fn with_options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_webhook_secret(mut self, secret: &str) -> Self {
        self.webhook_secret = secret.to_string();
        self
    }

    /// Stores a payment for order `A1`, and moves it to `status` if that isn't pending.
    pub async fn seed_payment(&self, id: &str, status: PaymentStatus) {
        let id = PaymentId::from(id);
        let record = NewPaymentRecord {
            id: id.clone(),
            order_id: Some("A1".into()),
            amount: Some(Cents::from(3550)),
            order_payload: Some(json!({"orderId": "A1", "items": [{"name": "Açaí 500ml", "qty": 1}]})),
            raw: None,
        };
        let db = self.api.db();
        db.upsert_record(record).await.expect("Error storing payment");
        if status != PaymentStatus::Pending {
            let evidence = StatusEvidence { status_detail: Some("seeded".into()), ..Default::default() };
            db.advance_status(&id, status, evidence).await.expect("Error advancing payment");
        }
    }

    pub async fn stored_status(&self, id: &str) -> Option<PaymentStatus> {
        let record = self.api.db().fetch_record(&PaymentId::from(id)).await.expect("Error fetching payment");
        record.map(|r| r.status)
    }

    fn configure(&self, cfg: &mut ServiceConfig) {
        let webhook_scope = web::scope("/api/webhook")
            .wrap(WebhookSignatureFactory::new(
                Secret::new(self.webhook_secret.clone()),
                SignaturePolicy::Strict,
                self.options.production,
            ))
            .service(ProcessorWebhookRoute::<SqliteDatabase, MockProcessor, MockForwarder>::new());
        cfg.app_data(self.api.clone())
            .app_data(self.simulation.clone())
            .app_data(web::Data::new(self.options))
            .service(webhook_scope)
            .service(GeneratePixRoute::<SqliteDatabase, MockProcessor, MockForwarder>::new())
            .service(CheckPaymentRoute::<SqliteDatabase, MockProcessor, MockForwarder>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, MockProcessor, MockForwarder>::new())
            .service(PaymentRecordRoute::<SqliteDatabase, MockProcessor, MockForwarder>::new())
            .service(PrintOrderRoute::<SqliteDatabase, MockProcessor, MockForwarder>::new())
            .service(generate_pix_dev)
            .service(dev_approve);
    }

    /// Sends the request through the full app. Errors raised by middleware are turned into responses, just as actix
    /// would do for a real client.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new().configure(|cfg| self.configure(cfg));
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => res.into_parts().1.map_into_boxed_body(),
            Err(e) => e.error_response(),
        };
        let status = res.status();
        let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned());
        (status, body.unwrap_or_default())
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.send(TestRequest::get().uri(path)).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, String) {
        self.send(TestRequest::post().uri(path).set_json(body)).await
    }
}

pub fn json_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
