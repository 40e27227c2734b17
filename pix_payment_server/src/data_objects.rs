use std::fmt::Display;

use pix_common::Cents;
use pix_payment_engine::{
    db_types::PaymentStatus,
    flow_objects::{CreatedPayment, NewPaymentRequest, StatusReport},
    pix_api::simulation_api::SimulatedPayment,
};
use pix_processor::PayerHints;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ServerError;

const ORDER_DESCRIPTION_PREFIX: &str = "Pedido #";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The body of a create-payment request.
///
/// Two shapes are accepted: `{amount, orderId, orderData}` and the older
/// `{transaction_amount, description: "Pedido #<orderId>", orderData}`. Customer details for the payer block may be in
/// `payer`, in `orderData.customer`, or at the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePixRequest {
    #[serde(default)]
    pub amount: Value,
    #[serde(default, rename = "orderId")]
    pub order_id: Value,
    #[serde(default, rename = "orderData")]
    pub order_data: Option<Value>,
    #[serde(default)]
    pub transaction_amount: Value,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payer: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CreatePixRequest {
    /// The amount and order id, from whichever shape the request uses.
    pub fn amount_and_order_id(&self) -> Result<(Cents, String), ServerError> {
        let (amount, order_id) = match (number_from(&self.amount), text_from(&self.order_id)) {
            (Some(a), Some(o)) => (a, o),
            _ => match (number_from(&self.transaction_amount), self.description.as_deref()) {
                (Some(a), Some(d)) => (a, d.replace(ORDER_DESCRIPTION_PREFIX, "").trim().to_string()),
                _ => {
                    return Err(ServerError::InvalidInput(
                        "amount/orderId or transaction_amount/description are required".into(),
                    ))
                },
            },
        };
        if order_id.is_empty() {
            return Err(ServerError::InvalidInput("orderId is required".into()));
        }
        let amount = Cents::try_from(amount).map_err(|e| ServerError::InvalidInput(e.to_string()))?;
        if !amount.is_positive() {
            return Err(ServerError::InvalidInput("amount must be greater than zero".into()));
        }
        Ok((amount, order_id))
    }

    /// Dev payments accept a zero amount and a missing order id.
    pub fn dev_amount_and_order_id(&self) -> Result<(Cents, Option<String>), ServerError> {
        let amount = number_from(&self.amount).or_else(|| number_from(&self.transaction_amount)).unwrap_or_default();
        let amount = Cents::try_from(amount).map_err(|e| ServerError::InvalidInput(e.to_string()))?;
        Ok((amount, text_from(&self.order_id)))
    }

    pub fn payer_hints(&self) -> PayerHints {
        let payer = self.payer.as_ref();
        let customer = self.order_data.as_ref().map(|d| &d["customer"]);
        let name = payer
            .and_then(|p| str_field(p, "first_name").or_else(|| str_field(p, "name")))
            .or_else(|| customer.and_then(|c| str_field(c, "name").or_else(|| str_field(c, "fullName"))))
            .or_else(|| self.name.clone());
        let phone = payer
            .and_then(|p| str_field(p, "phone").or_else(|| str_field(p, "phone_number")))
            .or_else(|| customer.and_then(|c| str_field(c, "phone")))
            .or_else(|| self.phone.clone());
        let email = payer.and_then(|p| str_field(p, "email"));
        let cpf = customer
            .and_then(|c| str_field(c, "cpf"))
            .or_else(|| payer.and_then(|p| str_field(&p["identification"], "number")));
        PayerHints { name, phone, email, cpf }
    }

    pub fn into_payment_request(self, idempotency_key: Option<String>) -> Result<NewPaymentRequest, ServerError> {
        let (amount, order_id) = self.amount_and_order_id()?;
        let payer = self.payer_hints();
        Ok(NewPaymentRequest { order_id, amount, order_payload: self.order_data, payer, idempotency_key })
    }
}

/// Numbers, or strings holding numbers. Zero counts as absent.
fn number_from(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| *n != 0.0)
}

fn text_from(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

/// String fields, with phone numbers and CPFs sometimes sent as numbers.
fn str_field(v: &Value, name: &str) -> Option<String> {
    text_from(&v[name])
}

/// What the storefront needs to show the customer a PIX charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixChargeResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    /// Base64-encoded QR code image
    pub qr_image: String,
    /// `png` when the processor supplied the image, `svg` when the server rendered it
    pub qr_image_format: String,
    pub copy_paste_code: String,
    #[serde(default)]
    pub simulated: bool,
}

impl PixChargeResponse {
    pub fn from_created<R>(created: CreatedPayment, rendered_svg: R) -> Result<Self, ServerError>
    where R: FnOnce(&str) -> Result<String, ServerError> {
        let (qr_image, qr_image_format) = match created.qr_image_base64 {
            Some(png) if !png.is_empty() => (png, "png".to_string()),
            _ => (rendered_svg(&created.copy_paste_code)?, "svg".to_string()),
        };
        Ok(Self {
            payment_id: created.payment_id.to_string(),
            status: created.status,
            qr_image,
            qr_image_format,
            copy_paste_code: created.copy_paste_code,
            simulated: created.simulated,
        })
    }

    pub fn from_simulated(payment: &SimulatedPayment, qr_svg: String) -> Self {
        Self {
            payment_id: payment.id.clone(),
            status: payment.status,
            qr_image: qr_svg,
            qr_image_format: "svg".to_string(),
            copy_paste_code: payment.copy_paste_code.clone(),
            simulated: true,
        }
    }
}

/// The answer to a forced status lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_approved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<StatusReport> for PaymentStatusResponse {
    fn from(report: StatusReport) -> Self {
        Self {
            status: report.status,
            status_detail: report.status_detail,
            date_approved: report.date_approved,
            error: report.error,
        }
    }
}

/// The answer to a status check for a simulated payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedStatus {
    pub status: PaymentStatus,
    pub simulated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevApproval {
    pub ok: bool,
    pub id: String,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxiedPrint {
    pub ok: bool,
    pub proxied: Value,
}
