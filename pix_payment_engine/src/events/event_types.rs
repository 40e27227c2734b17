use serde::{Deserialize, Serialize};

use crate::db_types::PaymentStatus;

/// Emitted whenever a payment reaches a new status, i.e. when it leaves `pending` or when a simulated payment is
/// approved. Repeated confirmations of the same status do not produce events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdatedEvent {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub order_id: Option<String>,
    pub simulated: bool,
}

impl PaymentUpdatedEvent {
    pub fn new(payment_id: impl Into<String>, status: PaymentStatus, order_id: Option<String>) -> Self {
        Self { payment_id: payment_id.into(), status, order_id, simulated: false }
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }
}
