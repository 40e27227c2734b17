use std::{env, str::FromStr, time::Duration};

use log::*;
use pix_common::{helpers::parse_boolean_flag, Secret};
use pix_payment_engine::forwarder::DEFAULT_FORWARD_TIMEOUT;
use pix_processor::ProcessorConfig;

use crate::errors::ServerError;

const DEFAULT_PIX_HOST: &str = "0.0.0.0";
const DEFAULT_PIX_PORT: u16 = 3000;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/pix_payments.db";
const MIN_PRINT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Production deployments never accept unsigned or badly signed webhooks, and hide the dev endpoints.
    pub production: bool,
    pub processor: ProcessorConfig,
    /// Shared secret for webhook signatures. Verification is switched off when this is empty.
    pub webhook_secret: Secret<String>,
    pub signature_policy: SignaturePolicy,
    /// The fulfillment (kitchen printer) endpoint. Paid orders are not forwarded anywhere if this is not set.
    pub print_webhook_url: Option<String>,
    pub print_timeout: Duration,
    /// Create simulated payments instead of real charges.
    pub simulate_payments: bool,
    /// Serve the dev endpoints even in production. **DANGER**
    pub allow_dev_endpoints: bool,
    /// Approve simulated payments automatically after this long. Zero disables auto-approval.
    pub dev_auto_approve: Duration,
    /// Don't probe the processor credentials on start-up
    pub skip_credential_check: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PIX_HOST.to_string(),
            port: DEFAULT_PIX_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            production: false,
            processor: ProcessorConfig::default(),
            webhook_secret: Secret::default(),
            signature_policy: SignaturePolicy::Strict,
            print_webhook_url: None,
            print_timeout: DEFAULT_FORWARD_TIMEOUT,
            simulate_payments: false,
            allow_dev_endpoints: false,
            dev_auto_approve: Duration::ZERO,
            skip_credential_check: false,
        }
    }
}

/// What to do with a webhook whose signature does not match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Reject the notification.
    #[default]
    Strict,
    /// Log a warning and carry on. Only honoured in sandbox deployments, for notifications that don't claim to be
    /// live.
    Permissive,
}

impl FromStr for SignaturePolicy {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(ServerError::ConfigurationError(format!("Unknown signature policy: {s}"))),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PIX_HOST").ok().unwrap_or_else(|| DEFAULT_PIX_HOST.into());
        let port = env::var("PIX_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PIX_PORT. {e} Using the default, {DEFAULT_PIX_PORT}, instead."
                    );
                    DEFAULT_PIX_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PIX_PORT);
        let database_url = env::var("PIX_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ PIX_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let production = parse_boolean_flag(env::var("PIX_PRODUCTION").ok(), false);
        let processor = ProcessorConfig::new_from_env_or_default();
        let webhook_secret = Secret::new(env::var("PIX_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            warn!("🪛️ PIX_WEBHOOK_SECRET is not set. Webhook signatures will NOT be verified.");
            String::default()
        }));
        let signature_policy = configure_signature_policy(production);
        let print_webhook_url = env::var("PIX_PRINT_WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty());
        if print_webhook_url.is_none() {
            info!("🪛️ PIX_PRINT_WEBHOOK_URL is not set. Paid orders will not be forwarded for printing.");
        }
        let print_timeout =
            secs_from_env("PIX_PRINT_TIMEOUT_SECS").map(clamp_print_timeout).unwrap_or(DEFAULT_FORWARD_TIMEOUT);
        let simulate_payments = parse_boolean_flag(env::var("PIX_SIMULATE_PAYMENTS").ok(), false);
        let simulate_payments = if !simulate_payments && processor.is_test_token() {
            info!("🪛️ The processor access token is a sandbox token. Payments will be simulated.");
            true
        } else {
            simulate_payments
        };
        let allow_dev_endpoints = parse_boolean_flag(env::var("PIX_ALLOW_DEV_ENDPOINTS").ok(), false);
        if production && allow_dev_endpoints {
            warn!("🚨️ Dev endpoints are enabled on a production deployment. Anyone can approve simulated payments.");
        }
        let dev_auto_approve = secs_from_env("PIX_DEV_AUTO_APPROVE_SECS").unwrap_or(Duration::ZERO);
        let skip_credential_check = parse_boolean_flag(env::var("PIX_SKIP_CREDENTIAL_CHECK").ok(), false);
        Self {
            host,
            port,
            database_url,
            production,
            processor,
            webhook_secret,
            signature_policy,
            print_webhook_url,
            print_timeout,
            simulate_payments,
            allow_dev_endpoints,
            dev_auto_approve,
            skip_credential_check,
        }
    }

    /// The processor credentials only matter when real charges are created.
    pub fn requires_processor_credentials(&self) -> bool {
        !self.simulate_payments
    }
}

fn configure_signature_policy(production: bool) -> SignaturePolicy {
    let policy = env::var("PIX_WEBHOOK_SIGNATURE_POLICY")
        .ok()
        .and_then(|s| s.parse::<SignaturePolicy>().map_err(|e| warn!("🪛️ {e}. Using 'strict' instead.")).ok())
        .unwrap_or_default();
    if policy == SignaturePolicy::Permissive && production {
        warn!("🪛️ The permissive signature policy is ignored in production. Using 'strict'.");
        return SignaturePolicy::Strict;
    }
    policy
}

/// A POST to the printer must finish well inside the dispatch claim window, or a second dispatcher could take the claim
/// over and print the order twice.
fn clamp_print_timeout(timeout: Duration) -> Duration {
    let clamped = timeout.clamp(MIN_PRINT_TIMEOUT, DEFAULT_FORWARD_TIMEOUT);
    if clamped != timeout {
        warn!("🪛️ PIX_PRINT_TIMEOUT_SECS must be between 3 and 8 seconds. Using {}s.", clamped.as_secs());
    }
    clamped
}

fn secs_from_env(name: &str) -> Option<Duration> {
    env::var(name).ok().and_then(|s| {
        s.parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}"))
            .ok()
    })
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub production: bool,
    pub simulate_payments: bool,
    pub allow_dev_endpoints: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            production: config.production,
            simulate_payments: config.simulate_payments,
            allow_dev_endpoints: config.allow_dev_endpoints,
        }
    }

    pub fn dev_endpoints_enabled(&self) -> bool {
        !self.production || self.allow_dev_endpoints
    }
}
