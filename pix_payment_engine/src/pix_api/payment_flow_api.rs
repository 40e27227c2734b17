use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use pix_processor::{
    data_objects::NewCharge,
    synthesize_payer,
    PaymentProcessor,
    ProcessorError,
    RetryPolicy,
    DEFAULT_FAKE_EMAIL_DOMAIN,
};

use crate::{
    db::traits::PaymentRecordStore,
    db_types::{NewPaymentRecord, PaymentId, PaymentRecord, PaymentStatus, StatusChange},
    events::{EventProducers, PaymentUpdatedEvent},
    forwarder::OrderForwarder,
    pix_api::{
        errors::PaymentFlowError,
        flow_objects::{
            CreatedPayment,
            DispatchOutcome,
            NewPaymentRequest,
            ProcessorObservation,
            Reconciliation,
            StatusOrigin,
            StatusReport,
            StatusSource,
        },
        fulfillment_api::FulfillmentApi,
    },
};

/// `PaymentFlowApi` is the reconciliation core. Every status observation, whatever its source, ends up in
/// [`Self::reconcile`], which persists it, triggers fulfillment for approved payments and notifies subscribers.
///
/// The guarantees are:
/// * A status only ever comes from the processor. Failed lookups change nothing.
/// * A terminal status is final. Observations that contradict it are discarded.
/// * Fulfillment happens at most once per payment, and only once the payment is approved.
pub struct PaymentFlowApi<B, P, F> {
    db: B,
    processor: P,
    fulfillment: FulfillmentApi<B, F>,
    producers: EventProducers,
    retry: RetryPolicy,
    email_domain: String,
}

impl<B, P, F> Debug for PaymentFlowApi<B, P, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B: Clone, P, F> PaymentFlowApi<B, P, F> {
    pub fn new(db: B, processor: P, forwarder: F, producers: EventProducers) -> Self {
        let fulfillment = FulfillmentApi::new(db.clone(), forwarder);
        Self {
            db,
            processor,
            fulfillment,
            producers,
            retry: RetryPolicy::default(),
            email_domain: DEFAULT_FAKE_EMAIL_DOMAIN.to_string(),
        }
    }

    /// The retry policy for processor lookups triggered by webhooks. Client-driven lookups make a single attempt,
    /// since the client will ask again anyway.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_email_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.email_domain = domain.into();
        self
    }

    pub fn with_stale_claim_after(mut self, stale_claim_after: Duration) -> Self {
        self.fulfillment = self.fulfillment.with_stale_claim_after(stale_claim_after);
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn fulfillment(&self) -> &FulfillmentApi<B, F> {
        &self.fulfillment
    }
}

impl<B, P, F> PaymentFlowApi<B, P, F>
where
    B: PaymentRecordStore,
    P: PaymentProcessor,
    F: OrderForwarder,
{
    /// Charges the customer for an order.
    ///
    /// The payment is stored as `pending` along with the order payload as soon as the processor has assigned an id.
    /// The processor's own answer then goes through [`Self::reconcile`] like any other observation.
    pub async fn create_payment(&self, request: NewPaymentRequest) -> Result<CreatedPayment, PaymentFlowError> {
        let order_id = request.order_id.trim().to_string();
        if order_id.is_empty() {
            return Err(PaymentFlowError::InvalidInput("orderId is required".into()));
        }
        if !request.amount.is_positive() {
            return Err(PaymentFlowError::InvalidInput("amount must be greater than zero".into()));
        }
        let payer = synthesize_payer(&request.payer, &self.email_domain, Utc::now().timestamp_millis());
        let charge = NewCharge::new(request.amount, &order_id, payer)?;
        let idempotency_key = request
            .idempotency_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| new_idempotency_key(&order_id));
        let payment = self.processor.create_payment(&charge, &idempotency_key).await?;
        let id = PaymentId::from(payment.id.clone());
        let record = NewPaymentRecord {
            id: id.clone(),
            order_id: Some(order_id.clone()),
            amount: Some(request.amount),
            order_payload: request.order_payload,
            raw: Some(payment.raw.clone()),
        };
        self.db.upsert_record(record).await?;
        info!("🔄️ Payment {id} created for order {order_id} ({})", request.amount);
        let reconciliation = self.reconcile(&id, ProcessorObservation::from(&payment), StatusSource::Creation).await?;
        Ok(CreatedPayment {
            payment_id: id,
            status: reconciliation.status(),
            status_detail: payment.status_detail,
            copy_paste_code: payment.qr_code.unwrap_or_default(),
            qr_image_base64: payment.qr_code_base64,
            simulated: false,
        })
    }

    /// Applies a status observation to the payment record.
    ///
    /// 1. Observations without a usable status (including `expired`, which the server never records) are discarded.
    /// 2. The store moves the record out of `pending` atomically, or reports that it already has this status, or
    ///    refuses because it has a different terminal status.
    /// 3. Approved payments are handed to the fulfillment dispatcher. This happens on repeated confirmations too, so
    ///    that a failed delivery is retried. The dispatcher's claim prevents double delivery.
    /// 4. Subscribers are notified when the record actually moved.
    pub async fn reconcile(
        &self,
        id: &PaymentId,
        observation: ProcessorObservation,
        source: StatusSource,
    ) -> Result<Reconciliation, PaymentFlowError> {
        let reported = observation.reported.clone();
        let status = match observation.status {
            Some(PaymentStatus::Expired) | None => {
                info!("🔄️ Processor reported '{reported}' for payment {id} ({source}). This tells us nothing. Ignoring.");
                let record = self.db.fetch_record(id).await?;
                return Ok(Reconciliation::Discarded { record, observed: reported });
            },
            Some(s) => s,
        };
        let result = match self.db.advance_status(id, status, observation.evidence).await? {
            StatusChange::Advanced(record) => {
                info!("🔄️ Payment {id} is now {status} ({source})");
                let (record, dispatch) = self.dispatch_if_approved(record).await;
                self.notify(&record).await;
                Reconciliation::Applied { record, advanced: true, dispatch }
            },
            StatusChange::Unchanged(record) => {
                debug!("🔄️ Payment {id} is still {status} ({source})");
                let (record, dispatch) = self.dispatch_if_approved(record).await;
                Reconciliation::Applied { record, advanced: false, dispatch }
            },
            StatusChange::Refused(record) => {
                warn!(
                    "🔄️ Payment {id} is already {}. Discarding '{reported}' from {source}, since final statuses never \
                     change.",
                    record.status
                );
                Reconciliation::Discarded { record: Some(record), observed: reported }
            },
        };
        Ok(result)
    }

    /// Asks the processor for the payment's status and reconciles the answer.
    ///
    /// If the processor can't be reached, nothing changes and [`Reconciliation::Unconfirmed`] is returned. When the
    /// stored record is already approved, that status was confirmed by the processor earlier, so fulfillment is
    /// attempted on that basis.
    pub async fn fetch_and_reconcile(
        &self,
        id: &PaymentId,
        source: StatusSource,
    ) -> Result<Reconciliation, PaymentFlowError> {
        match self.fetch_observation(id, source).await {
            Ok(observation) => self.reconcile(id, observation, source).await,
            Err(e) => {
                warn!("🔄️ Could not confirm the status of payment {id} with the processor ({source}). {e}");
                let record = self.db.fetch_record(id).await?;
                let (record, dispatch) = match record {
                    Some(r) if r.status.is_approved() => {
                        info!("🔄️ Payment {id} was approved earlier. Using the stored status.");
                        let (r, dispatch) = self.dispatch_if_approved(r).await;
                        (Some(r), dispatch)
                    },
                    r => (r, None),
                };
                Ok(Reconciliation::Unconfirmed { record, dispatch, reason: e.to_string() })
            },
        }
    }

    /// The status check clients poll. Final statuses are answered from the local record; otherwise the processor is
    /// asked once. If that fails, the stored status (or `pending`) is returned with an error annotation.
    pub async fn check_status(&self, id: &PaymentId) -> Result<StatusReport, PaymentFlowError> {
        if let Some(record) = self.db.fetch_record(id).await? {
            if record.status.is_terminal() {
                trace!("🔄️ Payment {id} is {} locally", record.status);
                let (record, _) = self.dispatch_if_approved(record).await;
                return Ok(StatusReport::local(&record));
            }
        }
        self.lookup_status(id, StatusSource::StatusCheck).await
    }

    /// Like [`Self::check_status`], but always asks the processor.
    pub async fn forced_lookup(&self, id: &PaymentId) -> Result<StatusReport, PaymentFlowError> {
        self.lookup_status(id, StatusSource::ForcedLookup).await
    }

    async fn lookup_status(&self, id: &PaymentId, source: StatusSource) -> Result<StatusReport, PaymentFlowError> {
        match self.fetch_observation(id, source).await {
            Ok(observation) => {
                let raw = observation.evidence.raw.clone();
                let status_detail = observation.evidence.status_detail.clone();
                let date_approved = observation.date_approved.clone();
                let status = self.reconcile(id, observation, source).await?.status();
                Ok(StatusReport {
                    status,
                    source: StatusOrigin::Upstream,
                    raw,
                    status_detail,
                    date_approved: date_approved.filter(|_| status.is_approved()),
                    error: None,
                })
            },
            Err(e) => {
                warn!("🔄️ Could not fetch payment {id} from the processor ({source}). {e}");
                let status = self.db.fetch_record(id).await?.map(|r| r.status).unwrap_or_default();
                Ok(StatusReport {
                    status,
                    source: StatusOrigin::Local,
                    raw: None,
                    status_detail: None,
                    date_approved: None,
                    error: Some(e.to_string()),
                })
            },
        }
    }

    async fn fetch_observation(
        &self,
        id: &PaymentId,
        source: StatusSource,
    ) -> Result<ProcessorObservation, ProcessorError> {
        let policy = match source {
            StatusSource::Webhook => self.retry,
            _ => RetryPolicy::once(),
        };
        let label = format!("Lookup of payment {id}");
        let payment = policy.run(&label, || self.processor.fetch_payment(id.as_str())).await?;
        Ok(ProcessorObservation::from(&payment))
    }

    /// Runs the dispatcher for approved, undispatched records. Dispatch problems never undo the reconciliation, so
    /// store errors here are reported as a failed dispatch.
    async fn dispatch_if_approved(&self, record: PaymentRecord) -> (PaymentRecord, Option<DispatchOutcome>) {
        if !record.status.is_approved() {
            return (record, None);
        }
        if record.is_dispatched() {
            return (record, Some(DispatchOutcome::AlreadyDispatched));
        }
        let outcome = match self.fulfillment.dispatch(&record.id).await {
            Ok(o) => o,
            Err(e) => {
                error!("🔄️ Could not dispatch payment {}. {e}", record.id);
                DispatchOutcome::Failed(e.to_string())
            },
        };
        let record = match outcome {
            DispatchOutcome::Dispatched => match self.db.fetch_record(&record.id).await {
                Ok(Some(updated)) => updated,
                _ => record,
            },
            _ => record,
        };
        (record, Some(outcome))
    }

    async fn notify(&self, record: &PaymentRecord) {
        let event = PaymentUpdatedEvent::new(record.id.as_str(), record.status, record.order_id.clone());
        self.producers.publish_payment_updated(event).await;
    }
}

fn new_idempotency_key(order_id: &str) -> String {
    format!("idemp-{order_id}-{:016x}", rand::random::<u64>())
}
