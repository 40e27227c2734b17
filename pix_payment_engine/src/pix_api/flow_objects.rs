use std::fmt::Display;

use pix_common::Cents;
use pix_processor::{data_objects::ProcessorPayment, PayerHints};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{PaymentId, PaymentRecord, PaymentStatus, StatusEvidence};

/// A request to charge a customer for an order.
#[derive(Debug, Clone, Default)]
pub struct NewPaymentRequest {
    pub order_id: String,
    pub amount: Cents,
    /// Stored with the payment and handed to the fulfillment endpoint once the payment is approved.
    pub order_payload: Option<Value>,
    pub payer: PayerHints,
    /// Re-use the same key when retrying a creation attempt. One is generated if absent.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPayment {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    /// The PIX "copia e cola" code
    pub copy_paste_code: String,
    /// PNG QR code supplied by the processor, base64-encoded. Callers render their own when absent.
    pub qr_image_base64: Option<String>,
    pub simulated: bool,
}

/// Where a status observation came from. Used for logging and to pick the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// The response to the charge request
    Creation,
    /// A processor notification
    Webhook,
    /// A client asking for the status of a payment
    StatusCheck,
    /// An explicit request to ask the processor, ignoring local state
    ForcedLookup,
}

impl Display for StatusSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusSource::Creation => write!(f, "creation"),
            StatusSource::Webhook => write!(f, "webhook"),
            StatusSource::StatusCheck => write!(f, "status check"),
            StatusSource::ForcedLookup => write!(f, "forced lookup"),
        }
    }
}

/// A status read from the processor.
///
/// This is the only input the reconciler accepts, and the only way to build one is from a processor response. That is
/// how the engine guarantees that `approved` is never recorded without the processor having said so.
#[derive(Debug, Clone)]
pub struct ProcessorObservation {
    /// The interpreted status. `None` means the processor's status string carries no usable information.
    pub status: Option<PaymentStatus>,
    /// What the processor actually said
    pub reported: String,
    pub evidence: StatusEvidence,
    pub date_approved: Option<String>,
}

impl From<&ProcessorPayment> for ProcessorObservation {
    fn from(payment: &ProcessorPayment) -> Self {
        Self {
            status: PaymentStatus::from_processor(&payment.status),
            reported: payment.status.clone(),
            evidence: StatusEvidence {
                raw: Some(payment.raw.clone()),
                status_detail: payment.status_detail.clone(),
                order_id: payment.external_reference.clone(),
            },
            date_approved: payment.date_approved.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The order was delivered by this call
    Dispatched,
    AlreadyDispatched,
    NotApproved,
    /// There is no order payload to deliver
    NoPayload,
    /// Another task is currently delivering the order
    InFlight,
    /// No fulfillment endpoint is configured
    Disabled,
    /// Delivery failed. The next reconciliation of this payment will try again.
    Failed(String),
}

/// What `reconcile` did with an observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The observation agrees with the record. `advanced` is true if this call moved the record out of `pending`.
    Applied { record: PaymentRecord, advanced: bool, dispatch: Option<DispatchOutcome> },
    /// The observation was dropped: it contradicted a terminal status, or it carried no usable status.
    Discarded { record: Option<PaymentRecord>, observed: String },
    /// The processor could not be asked. Nothing changed. If the record was already approved, fulfillment was
    /// re-attempted from the stored status.
    Unconfirmed { record: Option<PaymentRecord>, dispatch: Option<DispatchOutcome>, reason: String },
}

impl Reconciliation {
    pub fn record(&self) -> Option<&PaymentRecord> {
        match self {
            Self::Applied { record, .. } => Some(record),
            Self::Discarded { record, .. } | Self::Unconfirmed { record, .. } => record.as_ref(),
        }
    }

    /// The canonical status after reconciliation. A payment we know nothing about is `pending`.
    pub fn status(&self) -> PaymentStatus {
        self.record().map(|r| r.status).unwrap_or_default()
    }

    pub fn dispatch(&self) -> Option<&DispatchOutcome> {
        match self {
            Self::Applied { dispatch, .. } | Self::Unconfirmed { dispatch, .. } => dispatch.as_ref(),
            Self::Discarded { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusOrigin {
    Local,
    Upstream,
}

/// The answer to "what is the status of this payment?"
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: PaymentStatus,
    pub source: StatusOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_approved: Option<String>,
    /// Set when the processor could not be asked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn local(record: &PaymentRecord) -> Self {
        Self {
            status: record.status,
            source: StatusOrigin::Local,
            raw: record.raw_value().cloned(),
            status_detail: record.status_detail.clone(),
            date_approved: date_approved(record),
            error: None,
        }
    }
}

fn date_approved(record: &PaymentRecord) -> Option<String> {
    if !record.status.is_approved() {
        return None;
    }
    record.raw_value().and_then(|v| v["date_approved"].as_str()).map(String::from)
}
