//! HMAC-SHA256 signatures for processor webhooks.
//!
//! The signature is computed over the raw request body with a shared secret. Processors put it in one of several
//! headers, in one of three formats: `ts=<unix>,v1=<hex>`, `sha256=<hex>`, or a bare hex digest.
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Headers that may carry a webhook signature, in order of preference.
pub const SIGNATURE_HEADERS: [&str; 4] = ["x-hub-signature-256", "x-hub-signature", "x-signature", "x-driven-signature"];

fn keyed_mac(secret: &str) -> HmacSha256 {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    }
}

/// The hex-encoded HMAC-SHA256 of `body`.
pub fn calculate_hmac(secret: &str, body: &[u8]) -> String {
    let mut mac = keyed_mac(secret);
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// A signature header in the `ts=<unix>,v1=<hex>` format.
pub fn signature_header(secret: &str, body: &[u8], timestamp: i64) -> String {
    format!("ts={timestamp},v1={}", calculate_hmac(secret, body))
}

/// Pulls the digest out of a signature header value. Returns `None` if there is no valid hex digest in it.
pub fn extract_digest(header: &str) -> Option<Vec<u8>> {
    let header = header.trim();
    let digest = header
        .split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("v1="))
        .or_else(|| header.strip_prefix("sha256="))
        .unwrap_or(header);
    hex::decode(digest.trim()).ok().filter(|d| !d.is_empty())
}

/// Checks the signature header against the body. The comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(digest) = extract_digest(header) else {
        return false;
    };
    let mut mac = keyed_mac(secret);
    mac.update(body);
    mac.verify_slice(&digest).is_ok()
}
