mod webhook_signature;

pub use webhook_signature::{SignatureWaived, WebhookSignatureFactory, WebhookSignatureService};
