//! Real-time fan-out of payment updates to connected clients.
//!
//! The hub owns the set of open subscriber channels. Delivery is best-effort: a channel that fails a write is treated
//! as disconnected and removed. Clients always have status polling to fall back on.
use std::{
    collections::HashMap,
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use log::*;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{db_types::PaymentStatus, events::PaymentUpdatedEvent};

pub const PAYMENT_UPDATE_MESSAGE: &str = "payment_update";

#[derive(Debug, Clone, Copy, Error)]
#[error("The subscriber has disconnected")]
pub struct SubscriberGone;

/// One end of a real-time channel, e.g. a WebSocket session.
pub trait Subscriber: Clone + Send + Sync + 'static {
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), SubscriberGone>> + Send;
}

pub type SubscriberId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdatePayload {
    pub id: String,
    pub status: PaymentStatus,
    pub order_id: Option<String>,
}

/// The message pushed to subscribers: `{"type":"payment_update","payload":{"id":..,"status":..,"orderId":..}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentUpdateMessage {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub payload: PaymentUpdatePayload,
}

impl From<&PaymentUpdatedEvent> for PaymentUpdateMessage {
    fn from(event: &PaymentUpdatedEvent) -> Self {
        Self {
            message_type: PAYMENT_UPDATE_MESSAGE,
            payload: PaymentUpdatePayload {
                id: event.payment_id.clone(),
                status: event.status,
                order_id: event.order_id.clone(),
            },
        }
    }
}

pub struct SubscriberHub<S> {
    subscribers: RwLock<HashMap<SubscriberId, S>>,
    next_id: AtomicU64,
}

impl<S> Default for SubscriberHub<S> {
    fn default() -> Self {
        Self { subscribers: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }
}

impl<S: Subscriber> SubscriberHub<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, subscriber: S) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, subscriber);
        debug!("📡️ Subscriber #{id} connected. {} subscriber(s) online", subscribers.len());
        id
    }

    pub async fn unregister(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(&id).is_some() {
            debug!("📡️ Subscriber #{id} disconnected. {} subscriber(s) online", subscribers.len());
        }
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Sends the message to every subscriber and returns how many received it. Subscribers that fail are dropped.
    pub async fn broadcast(&self, message: &PaymentUpdateMessage) -> usize {
        let text = match serde_json::to_string(message) {
            Ok(t) => t,
            Err(e) => {
                error!("📡️ Could not serialize payment update. {e}");
                return 0;
            },
        };
        // Sends happen outside the lock so a slow client can't block (un)registration
        let snapshot = self.subscribers.read().await.iter().map(|(id, s)| (*id, s.clone())).collect::<Vec<_>>();
        let mut gone = Vec::new();
        let mut delivered = 0;
        for (id, mut subscriber) in snapshot {
            match subscriber.send_text(text.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => gone.push(id),
            }
        }
        if !gone.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &gone {
                subscribers.remove(id);
            }
            debug!("📡️ Dropped {} dead subscriber(s)", gone.len());
        }
        trace!("📡️ Payment {} ({}) pushed to {delivered} subscriber(s)", message.payload.id, message.payload.status);
        delivered
    }
}
