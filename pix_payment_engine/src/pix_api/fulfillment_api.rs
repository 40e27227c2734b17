use std::time::Duration;

use log::*;
use serde_json::Value;

use crate::{
    db::traits::{PaymentRecordStore, StoreError},
    db_types::PaymentId,
    forwarder::{ForwardError, ForwardResponse, OrderForwarder},
    pix_api::flow_objects::DispatchOutcome,
};

/// A claim older than this belongs to a dispatch that died mid-flight (e.g. the process was killed during the POST).
pub const DEFAULT_STALE_CLAIM: Duration = Duration::from_secs(60);

/// Delivers paid orders to the fulfillment endpoint, at most once per payment.
///
/// Before POSTing, the dispatcher claims the record in the store. The claim only succeeds if the record is approved,
/// has an order payload, and has not been dispatched yet, and only one caller can hold it. A successful delivery sets
/// the permanent dispatch marker; a failed one releases the claim so that the next reconciliation can retry.
pub struct FulfillmentApi<B, F> {
    db: B,
    forwarder: F,
    stale_claim_after: Duration,
}

impl<B, F> FulfillmentApi<B, F> {
    pub fn new(db: B, forwarder: F) -> Self {
        Self { db, forwarder, stale_claim_after: DEFAULT_STALE_CLAIM }
    }

    pub fn with_stale_claim_after(mut self, stale_claim_after: Duration) -> Self {
        self.stale_claim_after = stale_claim_after;
        self
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }
}

impl<B, F> FulfillmentApi<B, F>
where
    B: PaymentRecordStore,
    F: OrderForwarder,
{
    pub async fn dispatch(&self, id: &PaymentId) -> Result<DispatchOutcome, StoreError> {
        if !self.forwarder.is_configured() {
            trace!("🖨️ No fulfillment endpoint configured. Payment {id} will not be forwarded");
            return Ok(DispatchOutcome::Disabled);
        }
        let Some(record) = self.db.claim_dispatch(id, self.stale_claim_after).await? else {
            return self.explain_unclaimable(id).await;
        };
        // A claimed record always has a payload
        let payload = record.order_payload.map(|j| j.0).unwrap_or_default();
        match self.forwarder.forward(&payload).await {
            Ok(_) => {
                self.db.complete_dispatch(id).await.map_err(|e| {
                    error!(
                        "🖨️ Order for payment {id} was delivered, but the dispatch marker could not be saved. The \
                         claim will block re-delivery until it goes stale. {e}"
                    );
                    e
                })?;
                info!("🖨️ Order {} for payment {id} sent to fulfillment", record.order_id.unwrap_or_default());
                Ok(DispatchOutcome::Dispatched)
            },
            Err(e) => {
                warn!("🖨️ Could not forward order for payment {id}. It will be retried on the next update. {e}");
                self.db.release_dispatch(id).await?;
                Ok(DispatchOutcome::Failed(e.to_string()))
            },
        }
    }

    async fn explain_unclaimable(&self, id: &PaymentId) -> Result<DispatchOutcome, StoreError> {
        let outcome = match self.db.fetch_record(id).await? {
            None => DispatchOutcome::NotApproved,
            Some(r) if r.is_dispatched() => DispatchOutcome::AlreadyDispatched,
            Some(r) if !r.status.is_approved() => DispatchOutcome::NotApproved,
            Some(r) if r.order_payload.is_none() => DispatchOutcome::NoPayload,
            Some(_) => DispatchOutcome::InFlight,
        };
        debug!("🖨️ Payment {id} not dispatched: {outcome:?}");
        Ok(outcome)
    }

    /// Sends an arbitrary order payload to the fulfillment endpoint. This bypasses the payment checks entirely and
    /// exists for manual reprints.
    pub async fn forward_order(&self, payload: &Value) -> Result<ForwardResponse, ForwardError> {
        self.forwarder.forward(payload).await
    }
}
