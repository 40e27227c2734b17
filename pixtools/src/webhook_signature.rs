//! Webhook signature diagnostics.
//!
//! When a processor's webhooks are rejected, the usual culprit is the wrong secret. This command computes the signature
//! the server expects and, given the header the processor actually sent, tries every candidate secret to find the one
//! that matches. None of this is used by the server when deciding whether to trust a request.
use anyhow::{anyhow, Result};
use clap::Args;
use pix_common::signature::{calculate_hmac, signature_header, verify_signature};

#[derive(Debug, Args)]
pub struct SignWebhookParams {
    /// The webhook secret. Repeat to try several candidates against --header.
    #[arg(short, long = "secret", required = true)]
    pub secrets: Vec<String>,
    /// The raw request body
    #[arg(short, long, conflicts_with = "file")]
    pub body: Option<String>,
    /// Read the raw request body from a file
    #[arg(short, long)]
    pub file: Option<String>,
    /// Unix timestamp for the signature header. Defaults to now.
    #[arg(short, long)]
    pub timestamp: Option<i64>,
    /// A signature header received from the processor, to check against each secret
    #[arg(long)]
    pub header: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SecretMatch {
    pub index: usize,
    pub masked: String,
}

pub fn print_webhook_signature(params: SignWebhookParams) -> Result<()> {
    let body = match (params.body, params.file) {
        (Some(body), _) => body,
        (None, Some(path)) => std::fs::read_to_string(&path).map_err(|e| anyhow!("Could not read {path}. {e}"))?,
        (None, None) => return Err(anyhow!("Supply the request body with --body or --file")),
    };
    let timestamp = params.timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let secret = &params.secrets[0];
    println!("----------------------------- Webhook Signature -----------------------------");
    println!("Body length : {} bytes", body.len());
    println!("HMAC-SHA256 : {}", calculate_hmac(secret, body.as_bytes()));
    println!("Header      : {}", signature_header(secret, body.as_bytes(), timestamp));
    if let Some(header) = params.header {
        match matching_secrets(&params.secrets, body.as_bytes(), &header).as_slice() {
            [] => println!("None of the {} secret(s) match the header", params.secrets.len()),
            matches => matches.iter().for_each(|m| println!("Secret #{} ({}) matches the header", m.index + 1, m.masked)),
        }
    }
    println!("-----------------------------------------------------------------------------");
    Ok(())
}

/// Every candidate secret that produces `header` for `body`
pub fn matching_secrets(secrets: &[String], body: &[u8], header: &str) -> Vec<SecretMatch> {
    secrets
        .iter()
        .enumerate()
        .filter(|(_, s)| verify_signature(s, body, header))
        .map(|(index, s)| SecretMatch { index, masked: mask(s) })
        .collect()
}

fn mask(secret: &str) -> String {
    let shown = secret.chars().take(4).collect::<String>();
    format!("{shown}{}", "*".repeat(secret.chars().count().saturating_sub(4)))
}
