use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
    StatusCode,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::ProcessorConfig,
    data_objects::{is_plain_payment_id, NewCharge, ProcessorPayment},
    PaymentProcessor,
    ProcessorError,
};

pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

#[derive(Clone)]
pub struct ProcessorApi {
    config: ProcessorConfig,
    client: Arc<Client>,
}

impl ProcessorApi {
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.access_token.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| ProcessorError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProcessorError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    pub async fn rest_query<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        extra_headers: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<Value, ProcessorError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| ProcessorError::UpstreamUnavailable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ REST query successful. {status}");
            response.json::<Value>().await.map_err(|e| ProcessorError::JsonError(e.to_string()))
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("💳️ The processor rejected our credentials ({status})");
            Err(ProcessorError::Unauthorized { status: status.as_u16() })
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ProcessorError::QueryError { status: status.as_u16(), message })
        }
    }

    /// Checks that the configured access token is accepted by the processor.
    pub async fn validate_credentials(&self) -> Result<Value, ProcessorError> {
        debug!("💳️ Validating processor credentials");
        let account = self.rest_query::<()>(Method::GET, "/users/me", &[], None).await?;
        info!("💳️ Processor credentials are valid. Account id: {}", account["id"]);
        Ok(account)
    }
}

impl PaymentProcessor for ProcessorApi {
    async fn create_payment(
        &self,
        charge: &NewCharge,
        idempotency_key: &str,
    ) -> Result<ProcessorPayment, ProcessorError> {
        debug!("💳️ Creating PIX charge for order {} ({idempotency_key})", charge.external_reference);
        let headers = [(IDEMPOTENCY_HEADER, idempotency_key)];
        let raw = self.rest_query(Method::POST, "/v1/payments", &headers, Some(charge)).await?;
        let payment = ProcessorPayment::try_from(raw)?;
        if payment.qr_code.is_none() && payment.qr_code_base64.is_none() {
            warn!("💳️ Payment {} was created without a PIX code", payment.id);
            return Err(ProcessorError::MissingQrCode(payment.id));
        }
        info!("💳️ Created payment {} for order {}. Status: {}", payment.id, charge.external_reference, payment.status);
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError> {
        if !is_plain_payment_id(payment_id) {
            return Err(ProcessorError::InvalidInput(format!("'{payment_id}' is not a valid payment id")));
        }
        let path = format!("/v1/payments/{payment_id}");
        trace!("💳️ Fetching payment {payment_id}");
        let raw = self.rest_query::<()>(Method::GET, &path, &[], None).await.map_err(|e| match e {
            // A lookup that got an answer we can't use is still just "the processor didn't tell us anything"
            ProcessorError::QueryError { status, message } => {
                ProcessorError::UpstreamUnavailable(format!("Error {status}. {message}"))
            },
            e => e,
        })?;
        let payment = ProcessorPayment::try_from(raw)?;
        debug!("💳️ Processor reports payment {payment_id} as '{}'", payment.status);
        Ok(payment)
    }
}
