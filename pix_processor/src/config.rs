use std::time::Duration;

use log::*;
use pix_common::Secret;

pub const DEFAULT_PROCESSOR_URL: &str = "https://api.mercadopago.com";
pub const DEFAULT_FAKE_EMAIL_DOMAIN: &str = "pix.invalid";
const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub api_url: String,
    pub access_token: Secret<String>,
    /// Timeout applied to every call to the processor.
    pub timeout: Duration,
    /// Domain used for payer e-mail addresses synthesised from the customer's name and phone number.
    pub fake_email_domain: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PROCESSOR_URL.to_string(),
            access_token: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            fake_email_domain: DEFAULT_FAKE_EMAIL_DOMAIN.to_string(),
        }
    }
}

impl ProcessorConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("PIX_PROCESSOR_URL").unwrap_or_else(|_| {
            info!("🪛️ PIX_PROCESSOR_URL not set, using {DEFAULT_PROCESSOR_URL}");
            DEFAULT_PROCESSOR_URL.to_string()
        });
        let access_token = Secret::new(std::env::var("PIX_PROCESSOR_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("🪛️ PIX_PROCESSOR_ACCESS_TOKEN not set. Calls to the payment processor will fail.");
            String::default()
        }));
        let timeout = std::env::var("PIX_PROCESSOR_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid PIX_PROCESSOR_TIMEOUT_SECS: {e}. Using the default instead."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let fake_email_domain = std::env::var("PIX_FAKE_EMAIL_DOMAIN").unwrap_or_else(|_| {
            debug!("🪛️ PIX_FAKE_EMAIL_DOMAIN not set, using {DEFAULT_FAKE_EMAIL_DOMAIN}");
            DEFAULT_FAKE_EMAIL_DOMAIN.to_string()
        });
        Self { api_url, access_token, timeout, fake_email_domain }
    }

    /// Sandbox credentials are issued with a `TEST-` prefix. They cannot create real charges.
    pub fn is_test_token(&self) -> bool {
        self.access_token.reveal().starts_with("TEST-")
    }

    pub fn has_credentials(&self) -> bool {
        !self.access_token.is_empty()
    }
}
