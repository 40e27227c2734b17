//! Client for the PIX payment processor.
//!
//! [`ProcessorApi`] talks to the processor's REST API. Everything else in the workspace depends on the
//! [`PaymentProcessor`] trait instead, so that the processor can be swapped out for a mock in tests.
//!
//! Failed calls are always reported as errors. Nothing in this crate ever turns a failure into a payment status.
mod api;
mod config;
mod error;
mod payer;
mod retry;

pub mod data_objects;

pub use api::ProcessorApi;
pub use config::{ProcessorConfig, DEFAULT_FAKE_EMAIL_DOMAIN, DEFAULT_PROCESSOR_URL};
pub use error::ProcessorError;
pub use payer::{fold_diacritics, synthesize_payer, PayerHints};
pub use retry::RetryPolicy;

use crate::data_objects::{NewCharge, ProcessorPayment};

/// The operations the reconciliation engine needs from a payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// Submit a new PIX charge. The same `idempotency_key` must be re-used when a creation attempt is retried so that
    /// the processor does not create a second charge.
    async fn create_payment(
        &self,
        charge: &NewCharge,
        idempotency_key: &str,
    ) -> Result<ProcessorPayment, ProcessorError>;

    /// Fetch the current state of a payment. This is a single attempt. Use [`RetryPolicy`] for retries.
    async fn fetch_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError>;
}
