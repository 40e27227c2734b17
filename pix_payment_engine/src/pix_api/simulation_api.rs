//! Simulated payments for development and demos.
//!
//! Simulated payments live in a process-scoped, in-memory table and vanish on restart. They never touch the durable
//! store or the processor, and approving one never triggers fulfillment. Approval does notify subscribers, so the
//! real-time channel can be tested end to end.
use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use pix_common::Cents;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    db_types::PaymentStatus,
    events::{EventProducers, PaymentUpdatedEvent},
    helpers::simulated_pix_code,
    pix_api::errors::SimulationError,
};

pub const SIMULATED_ID_PREFIX: &str = "DEV-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedPayment {
    pub id: String,
    pub order_id: String,
    pub amount: Cents,
    pub status: PaymentStatus,
    pub copy_paste_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct SimulationApi {
    payments: Arc<RwLock<HashMap<String, SimulatedPayment>>>,
    producers: EventProducers,
    auto_approve_after: Option<Duration>,
}

impl SimulationApi {
    pub fn new(producers: EventProducers) -> Self {
        Self { payments: Arc::default(), producers, auto_approve_after: None }
    }

    /// Approve every new simulated payment after `delay`. A zero delay disables auto-approval.
    pub fn with_auto_approve(mut self, delay: Duration) -> Self {
        self.auto_approve_after = Some(delay).filter(|d| !d.is_zero());
        self
    }

    pub fn is_simulated_id(id: &str) -> bool {
        id.starts_with(SIMULATED_ID_PREFIX)
    }

    pub async fn create_payment(
        &self,
        order_id: Option<String>,
        amount: Cents,
    ) -> Result<SimulatedPayment, SimulationError> {
        if amount < Cents::from(0) {
            return Err(SimulationError::InvalidInput(format!("amount cannot be negative ({amount})")));
        }
        let payment = {
            let mut payments = self.payments.write().await;
            let mut stamp = Utc::now().timestamp_millis();
            while payments.contains_key(&format!("{SIMULATED_ID_PREFIX}{stamp}")) {
                stamp += 1;
            }
            let id = format!("{SIMULATED_ID_PREFIX}{stamp}");
            let order_id = order_id.filter(|o| !o.trim().is_empty()).unwrap_or_else(|| id.clone());
            let payment = SimulatedPayment {
                copy_paste_code: simulated_pix_code(&order_id, amount),
                id: id.clone(),
                order_id,
                amount,
                status: PaymentStatus::Pending,
                created_at: Utc::now(),
            };
            payments.insert(id, payment.clone());
            payment
        };
        info!("🧪️ Simulated payment {} created for order {} ({amount})", payment.id, payment.order_id);
        if let Some(delay) = self.auto_approve_after {
            let api = self.clone();
            let id = payment.id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match api.approve(&id).await {
                    Ok(_) => info!("🧪️ Simulated payment {id} auto-approved after {delay:?}"),
                    Err(e) => warn!("🧪️ Could not auto-approve simulated payment {id}. {e}"),
                }
            });
        }
        Ok(payment)
    }

    pub async fn fetch(&self, id: &str) -> Option<SimulatedPayment> {
        self.payments.read().await.get(id).cloned()
    }

    /// The status of a simulated payment. Unknown ids (e.g. from before a restart) are reported as pending.
    pub async fn status(&self, id: &str) -> Result<PaymentStatus, SimulationError> {
        if !Self::is_simulated_id(id) {
            return Err(SimulationError::InvalidId(id.to_string()));
        }
        Ok(self.fetch(id).await.map(|p| p.status).unwrap_or_default())
    }

    /// Marks a simulated payment as approved and notifies subscribers. Approving twice is harmless.
    pub async fn approve(&self, id: &str) -> Result<SimulatedPayment, SimulationError> {
        if !Self::is_simulated_id(id) {
            return Err(SimulationError::InvalidId(id.to_string()));
        }
        let (payment, changed) = {
            let mut payments = self.payments.write().await;
            let payment = payments.get_mut(id).ok_or_else(|| SimulationError::NotFound(id.to_string()))?;
            let changed = payment.status == PaymentStatus::Pending;
            if changed {
                payment.status = PaymentStatus::Approved;
            }
            (payment.clone(), changed)
        };
        if changed {
            info!("🧪️ Simulated payment {id} approved");
            let event = PaymentUpdatedEvent::new(id, payment.status, Some(payment.order_id.clone())).simulated();
            self.producers.publish_payment_updated(event).await;
        }
        Ok(payment)
    }
}
