use anyhow::{anyhow, Result};
use log::debug;
use pix_payment_server::data_objects::{PaymentStatusResponse, PixChargeResponse, ProxiedPrint};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Response,
    Url,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::poller::StatusQuery;

pub struct PaymentServerClient {
    client: Client,
    server: Url,
}

impl PaymentServerClient {
    pub fn new(server: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder().user_agent("PIX Payment Server Client").default_headers(headers).build()?;
        let server = Url::parse(server).map_err(|e| anyhow!("Invalid server URL {server}. {e}"))?;
        Ok(Self { client, server })
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.server.join(path).map_err(|e| anyhow!("Failed to join URL: {e}"))
    }

    pub async fn health(&self) -> Result<String> {
        let res = self.client.get(self.url("/health")?).send().await?;
        Ok(res.text().await?)
    }

    /// Creates a PIX charge. Re-use `idempotency_key` when retrying a failed attempt.
    pub async fn create_payment(
        &self,
        body: &Value,
        idempotency_key: Option<&str>,
        dev: bool,
    ) -> Result<PixChargeResponse> {
        let path = if dev { "/api/generate-pix-dev" } else { "/api/generate-pix" };
        let mut req = self.client.post(self.url(path)?).json(body);
        if let Some(key) = idempotency_key {
            req = req.header(pix_payment_server::helpers::IDEMPOTENCY_HEADER, key);
        }
        parse(req.send().await?).await
    }

    /// The status check that clients poll. The answer is the raw JSON, since simulated payments and real ones are
    /// reported differently.
    pub async fn check_payment(&self, id: &str) -> Result<Value> {
        let res = self.client.get(self.url(&format!("/api/check-payment/{id}"))?).send().await?;
        parse(res).await
    }

    pub async fn payment_status(&self, id: &str) -> Result<PaymentStatusResponse> {
        let res = self.client.get(self.url(&format!("/api/payment-status/{id}"))?).send().await?;
        parse(res).await
    }

    pub async fn payment_record(&self, id: &str) -> Result<Value> {
        let res = self.client.get(self.url(&format!("/api/payments/{id}"))?).send().await?;
        parse(res).await
    }

    pub async fn print_order(&self, order: &Value) -> Result<ProxiedPrint> {
        let res = self.client.post(self.url("/api/print-order")?).json(order).send().await?;
        parse(res).await
    }
}

impl StatusQuery for PaymentServerClient {
    async fn query_status(&self, id: &str) -> Result<String> {
        let response = self.check_payment(id).await?;
        debug!("Status check for {id}: {response}");
        response["status"].as_str().map(String::from).ok_or_else(|| anyhow!("No status in response: {response}"))
    }
}

async fn parse<T: DeserializeOwned>(res: Response) -> Result<T> {
    let status = res.status();
    if status.is_success() {
        Ok(res.json::<T>().await?)
    } else {
        let reason = res.text().await?;
        Err(anyhow!("Request failed with status {status}. {reason}"))
    }
}
