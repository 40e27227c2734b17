//! PIX Payment Engine
//!
//! The engine reconciles payment statuses reported by a PIX payment processor with a durable local record, and makes
//! sure every paid order is sent to fulfillment exactly once. It knows nothing about HTTP servers; the payment server
//! crate wires it up to the outside world.
//!
//! The library is divided into these sections:
//! 1. Payment record storage ([`mod@db`]). [`PaymentRecordStore`] defines what a backend has to provide; SQLite is the
//!    supported backend. The data types used in the store are defined in [`db_types`].
//! 2. The public API ([`pix_api`]). [`PaymentFlowApi`] is the reconciler and is the only component that changes
//!    payment statuses. [`FulfillmentApi`] delivers paid orders through an [`OrderForwarder`]. [`SimulationApi`]
//!    manages simulated payments for development.
//! 3. Real-time notification ([`notifier`]). A [`SubscriberHub`] pushes payment updates to connected clients.
//!
//! The engine emits a [`events::PaymentUpdatedEvent`] whenever a payment reaches a new status. Hook into these with
//! [`events::EventHooks`].
mod db;

pub mod db_types;
pub mod events;
pub mod forwarder;
pub mod helpers;
pub mod notifier;
pub mod pix_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{PaymentRecordStore, StoreError};
pub use forwarder::{ForwardError, ForwardResponse, HttpOrderForwarder, OrderForwarder};
pub use notifier::{Subscriber, SubscriberGone, SubscriberHub};
pub use pix_api::{
    errors::{PaymentFlowError, SimulationError},
    flow_objects,
    fulfillment_api::FulfillmentApi,
    payment_flow_api::PaymentFlowApi,
    simulation_api::SimulationApi,
};
