use std::time::Duration;

use thiserror::Error;

use crate::db_types::{NewPaymentRecord, PaymentId, PaymentRecord, PaymentStatus, StatusChange, StatusEvidence};

#[allow(async_fn_in_trait)]
pub trait PaymentRecordStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn fetch_record(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, StoreError>;

    /// Creates the record if it does not exist, otherwise merges the non-empty fields of `record` into it.
    ///
    /// The status and dispatch markers of an existing record are never touched.
    async fn upsert_record(&self, record: NewPaymentRecord) -> Result<PaymentRecord, StoreError>;

    /// Attempts to move the record to `status`, creating a pending record first if there isn't one.
    ///
    /// Only `pending -> terminal` moves are applied. Observing the status the record already has returns
    /// [`StatusChange::Unchanged`]; anything else is [`StatusChange::Refused`]. The move is atomic, so when several
    /// callers race to advance the same record, exactly one of them receives [`StatusChange::Advanced`].
    async fn advance_status(
        &self,
        id: &PaymentId,
        status: PaymentStatus,
        evidence: StatusEvidence,
    ) -> Result<StatusChange, StoreError>;

    /// Takes ownership of the fulfillment dispatch for the record.
    ///
    /// Returns the record if the caller now owns the dispatch. That requires the record to be approved, carry an
    /// order payload, not be dispatched yet, and have no other claim younger than `stale_after`. Returns `None`
    /// otherwise.
    async fn claim_dispatch(&self, id: &PaymentId, stale_after: Duration) -> Result<Option<PaymentRecord>, StoreError>;

    /// Marks the record as dispatched and drops the claim. Once set, the dispatch marker is permanent.
    async fn complete_dispatch(&self, id: &PaymentId) -> Result<PaymentRecord, StoreError>;

    /// Drops the claim after a failed dispatch so that a later reconciliation can try again.
    async fn release_dispatch(&self, id: &PaymentId) -> Result<(), StoreError>;

    async fn close(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Payment {0} cannot be marked as dispatched")]
    CannotDispatch(PaymentId),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
