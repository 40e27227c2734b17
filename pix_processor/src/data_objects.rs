use std::fmt::Display;

use pix_common::Cents;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProcessorError;

pub const PIX_PAYMENT_METHOD: &str = "pix";
pub const DEFAULT_CPF: &str = "00000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(rename = "type")]
    pub id_type: String,
    pub number: String,
}

impl Default for Identification {
    fn default() -> Self {
        Self { id_type: "CPF".into(), number: DEFAULT_CPF.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub identification: Identification,
}

/// The body of a charge request.
#[derive(Debug, Clone, Serialize)]
pub struct NewCharge {
    pub transaction_amount: f64,
    pub description: String,
    pub payment_method_id: String,
    pub payer: Payer,
    pub external_reference: String,
}

impl NewCharge {
    pub fn new(amount: Cents, order_id: &str, payer: Payer) -> Result<Self, ProcessorError> {
        if !amount.is_positive() {
            return Err(ProcessorError::InvalidInput(format!("Charge amount must be positive, got {amount}")));
        }
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(ProcessorError::InvalidInput("Charges must reference an order".into()));
        }
        if payer.email.is_empty() {
            return Err(ProcessorError::InvalidInput("Charges must have a payer e-mail".into()));
        }
        Ok(Self {
            transaction_amount: amount.as_reais(),
            description: format!("Pedido #{order_id}"),
            payment_method_id: PIX_PAYMENT_METHOD.into(),
            payer,
            external_reference: order_id.to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PaymentIdRepr {
    Number(u64),
    Text(String),
}

impl Display for PaymentIdRepr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Clone, Deserialize)]
struct PaymentResponse {
    id: PaymentIdRepr,
    #[serde(default)]
    status: Option<String>,
    status_detail: Option<String>,
    date_approved: Option<String>,
    external_reference: Option<String>,
    point_of_interaction: Option<PointOfInteraction>,
}

/// A payment as reported by the processor.
///
/// `status` is the processor's own status string. It is deliberately left uninterpreted here; the engine decides what
/// each string means.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorPayment {
    pub id: String,
    pub status: String,
    pub status_detail: Option<String>,
    pub date_approved: Option<String>,
    pub external_reference: Option<String>,
    /// The PIX "copia e cola" code
    pub qr_code: Option<String>,
    /// A PNG of the QR code, base64-encoded
    pub qr_code_base64: Option<String>,
    /// The full response body
    pub raw: Value,
}

impl TryFrom<Value> for ProcessorPayment {
    type Error = ProcessorError;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let response = serde_json::from_value::<PaymentResponse>(raw.clone())
            .map_err(|e| ProcessorError::JsonError(format!("Unexpected payment response. {e}")))?;
        let tx = response.point_of_interaction.and_then(|p| p.transaction_data).unwrap_or_default();
        Ok(Self {
            id: response.id.to_string(),
            status: response.status.unwrap_or_default(),
            status_detail: response.status_detail,
            date_approved: response.date_approved,
            external_reference: response.external_reference,
            qr_code: tx.qr_code,
            qr_code_base64: tx.qr_code_base64,
            raw,
        })
    }
}

/// Payment ids end up in request paths, so only plain tokens are accepted: ASCII letters, digits, `-` and `_`.
pub fn is_plain_payment_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
