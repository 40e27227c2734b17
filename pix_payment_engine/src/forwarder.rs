//! Delivery of paid orders to the fulfillment (kitchen printer) endpoint.
use std::time::Duration;

use log::*;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Error)]
pub enum ForwardError {
    #[error("No fulfillment endpoint has been configured")]
    NotConfigured,
    #[error("The fulfillment endpoint rejected the order. Error {status}. {body}")]
    Rejected { status: u16, body: String },
    #[error("Could not reach the fulfillment endpoint. {0}")]
    Unreachable(String),
    #[error("Could not configure the fulfillment client. {0}")]
    Initialization(String),
}

#[allow(async_fn_in_trait)]
pub trait OrderForwarder {
    /// `false` means fulfillment is switched off for this deployment.
    fn is_configured(&self) -> bool;

    /// POSTs the order payload. Any non-2xx response is an error.
    async fn forward(&self, payload: &Value) -> Result<ForwardResponse, ForwardError>;
}

#[derive(Clone)]
pub struct HttpOrderForwarder {
    url: Option<String>,
    client: Client,
}

impl HttpOrderForwarder {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| ForwardError::Initialization(e.to_string()))?;
        let url = url.filter(|u| !u.trim().is_empty());
        Ok(Self { url, client })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl OrderForwarder for HttpOrderForwarder {
    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn forward(&self, payload: &Value) -> Result<ForwardResponse, ForwardError> {
        let url = self.url.as_deref().ok_or(ForwardError::NotConfigured)?;
        trace!("🖨️ Forwarding order to {url}");
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ForwardError::Unreachable(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if (200..300).contains(&status) {
            debug!("🖨️ Fulfillment endpoint accepted the order ({status})");
            Ok(ForwardResponse { status, body })
        } else {
            warn!("🖨️ Fulfillment endpoint returned {status}. {}", body.chars().take(200).collect::<String>());
            Err(ForwardError::Rejected { status, body })
        }
    }
}
