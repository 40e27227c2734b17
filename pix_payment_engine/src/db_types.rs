use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use pix_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

//--------------------------------------      PaymentId      ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PaymentId(pub String);

impl FromStr for PaymentId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for PaymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PaymentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
/// The lifecycle of a payment. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    /// The processor has confirmed the payment.
    Approved,
    Rejected,
    Cancelled,
    /// The client gave up waiting. The server never records this status itself.
    Expired,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Interprets a processor status string.
    ///
    /// `paid` and `success` are synonyms for `approved`. The processor's intermediate states all mean "not settled
    /// yet". Anything else (refunds, chargebacks, typos) returns `None`, i.e. no usable information.
    pub fn from_processor(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "approved" | "paid" | "success" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            "pending" | "in_process" | "in_mediation" | "authorized" => Some(Self::Pending),
            _ => None,
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Approved => write!(f, "approved"),
            PaymentStatus::Rejected => write!(f, "rejected"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
            PaymentStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid payment status: {0}")]
pub struct ConversionError(String);

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------    PaymentRecord    ---------------------------------------------------------
/// The durable record of a single payment attempt.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: Option<String>,
    pub amount: Option<Cents>,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    /// Everything the fulfillment endpoint needs to know about the order (cart, customer, delivery).
    pub order_payload: Option<Json<Value>>,
    /// The most recent response from the processor that changed this record.
    pub raw: Option<Json<Value>>,
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Set while a dispatch is in flight.
    #[serde(skip)]
    pub dispatch_claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }

    pub fn raw_value(&self) -> Option<&Value> {
        self.raw.as_ref().map(|j| &j.0)
    }
}

/// Data for a new payment record, or to merge into an existing one. `None` fields leave the stored value alone.
///
/// There is deliberately no status here. Statuses only ever change through
/// [`crate::PaymentRecordStore::advance_status`].
#[derive(Debug, Clone, Default)]
pub struct NewPaymentRecord {
    pub id: PaymentId,
    pub order_id: Option<String>,
    pub amount: Option<Cents>,
    pub order_payload: Option<Value>,
    pub raw: Option<Value>,
}

impl NewPaymentRecord {
    pub fn new(id: PaymentId) -> Self {
        Self { id, ..Default::default() }
    }
}

/// What the processor said alongside a status.
#[derive(Debug, Clone, Default)]
pub struct StatusEvidence {
    pub raw: Option<Value>,
    pub status_detail: Option<String>,
    /// The order reference the processor has on file. Only used when the record doesn't exist yet.
    pub order_id: Option<String>,
}

/// The result of trying to move a payment to a new status.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    /// The record moved from `pending` to a terminal status. Exactly one caller sees this for any given record.
    Advanced(PaymentRecord),
    /// The record already had the observed status.
    Unchanged(PaymentRecord),
    /// The record is in a different terminal state. Terminal states are final, so the observation was discarded.
    Refused(PaymentRecord),
}

impl StatusChange {
    pub fn record(&self) -> &PaymentRecord {
        match self {
            Self::Advanced(r) | Self::Unchanged(r) | Self::Refused(r) => r,
        }
    }

    pub fn into_record(self) -> PaymentRecord {
        match self {
            Self::Advanced(r) | Self::Unchanged(r) | Self::Refused(r) => r,
        }
    }
}
