//! # Payment record storage.
//!
//! [`PaymentRecordStore`] is the contract a backend must fulfil to hold payment records for the engine. The store is
//! the only shared mutable state in the system, and several sources (webhooks, status checks, the creation flow) can
//! race to update the same record. Backends must therefore make the two critical writes atomic:
//!
//! * [`PaymentRecordStore::advance_status`] must let exactly one caller move a record out of `pending`.
//! * [`PaymentRecordStore::claim_dispatch`] must let exactly one caller own a fulfillment attempt.
mod payment_record_store;

pub use payment_record_store::{PaymentRecordStore, StoreError};
