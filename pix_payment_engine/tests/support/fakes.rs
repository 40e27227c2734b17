use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use pix_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers, PaymentUpdatedEvent},
    ForwardError,
    ForwardResponse,
    OrderForwarder,
};
use pix_processor::{
    data_objects::{NewCharge, ProcessorPayment},
    PaymentProcessor,
    ProcessorError,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// A processor whose answers are scripted by the test.
#[derive(Clone, Default)]
pub struct FakeProcessor {
    statuses: Arc<Mutex<HashMap<String, String>>>,
    offline: Arc<AtomicBool>,
    pub fetches: Arc<AtomicUsize>,
    pub charges: Arc<Mutex<Vec<(NewCharge, String)>>>,
    creation_status: Arc<Mutex<Option<String>>>,
}

impl FakeProcessor {
    pub fn set_status(&self, id: &str, status: &str) {
        self.statuses.lock().unwrap().insert(id.to_string(), status.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_creation_status(&self, status: &str) {
        *self.creation_status.lock().unwrap() = Some(status.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl PaymentProcessor for FakeProcessor {
    async fn create_payment(
        &self,
        charge: &NewCharge,
        idempotency_key: &str,
    ) -> Result<ProcessorPayment, ProcessorError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProcessorError::UpstreamUnavailable("processor offline".into()));
        }
        let mut charges = self.charges.lock().unwrap();
        charges.push((charge.clone(), idempotency_key.to_string()));
        let id = format!("PAY{}", charges.len());
        let status = self.creation_status.lock().unwrap().clone().unwrap_or_else(|| "pending".into());
        self.set_status(&id, &status);
        ProcessorPayment::try_from(json!({
            "id": id,
            "status": status,
            "status_detail": "pending_waiting_transfer",
            "external_reference": charge.external_reference,
            "point_of_interaction": { "transaction_data": { "qr_code": "00020126PIX", "qr_code_base64": "iVBORw0K" } }
        }))
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.offline.load(Ordering::SeqCst) {
            return Err(ProcessorError::UpstreamUnavailable("processor offline".into()));
        }
        let status = self.statuses.lock().unwrap().get(payment_id).cloned();
        match status {
            Some(status) => {
                let date_approved = (status == "approved").then_some("2024-06-10T12:00:00Z");
                ProcessorPayment::try_from(json!({
                    "id": payment_id,
                    "status": status,
                    "date_approved": date_approved,
                }))
            },
            None => Err(ProcessorError::UpstreamUnavailable(format!("Error 404. Payment {payment_id} not found"))),
        }
    }
}

/// Counts deliveries instead of POSTing anywhere.
#[derive(Clone)]
pub struct CountingForwarder {
    configured: bool,
    failing: Arc<AtomicBool>,
    delay: Duration,
    pub payloads: Arc<Mutex<Vec<Value>>>,
}

impl CountingForwarder {
    pub fn new() -> Self {
        Self { configured: true, failing: Arc::default(), delay: Duration::ZERO, payloads: Arc::default() }
    }

    pub fn unconfigured() -> Self {
        Self { configured: false, ..Self::new() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

impl OrderForwarder for CountingForwarder {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn forward(&self, payload: &Value) -> Result<ForwardResponse, ForwardError> {
        if !self.configured {
            return Err(ForwardError::NotConfigured);
        }
        tokio::time::sleep(self.delay).await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(ForwardError::Rejected { status: 503, body: "printer offline".into() });
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(ForwardResponse { status: 200, body: "ok".into() })
    }
}

/// Collects payment update events so tests can inspect what would have been broadcast.
pub async fn event_recorder() -> (EventProducers, mpsc::Receiver<PaymentUpdatedEvent>) {
    let (tx, rx) = mpsc::channel(64);
    let mut hooks = EventHooks::default();
    hooks.on_payment_updated(move |ev| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ev).await;
        })
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    (producers, rx)
}

/// Waits briefly for the next event. `None` means nothing was published.
pub async fn next_event(rx: &mut mpsc::Receiver<PaymentUpdatedEvent>) -> Option<PaymentUpdatedEvent> {
    tokio::time::timeout(Duration::from_millis(250), rx.recv()).await.ok().flatten()
}
