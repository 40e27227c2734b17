//! The real-time channel.
//!
//! Each WebSocket connection is registered with the [`SubscriberHub`] and receives every payment update as
//! `{"type":"payment_update","payload":{"id":..,"status":..,"orderId":..}}`. Clients may send the text `ping` to
//! check the connection and get `pong` back. The server pings every 5s and drops connections that stay silent for
//! 10s.
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use actix_web::{get, web, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use log::*;
use pix_payment_engine::{
    events::{EventHandlers, EventHooks},
    notifier::PaymentUpdateMessage,
    Subscriber,
    SubscriberGone,
    SubscriberHub,
};
use tokio::time;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
pub const REALTIME_EVENT_BUFFER_SIZE: usize = 64;

/// The sending half of a WebSocket connection
#[derive(Clone)]
pub struct WsSubscriber {
    session: Session,
}

impl WsSubscriber {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Subscriber for WsSubscriber {
    async fn send_text(&mut self, text: String) -> Result<(), SubscriberGone> {
        self.session.text(text).await.map_err(|_| SubscriberGone)
    }
}

pub type WsHub = SubscriberHub<WsSubscriber>;

/// Pushes every payment update the engine emits to the connected WebSocket clients.
pub fn create_realtime_event_handlers(hub: Arc<WsHub>) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_payment_updated(move |ev| {
        let hub = Arc::clone(&hub);
        Box::pin(async move {
            let message = PaymentUpdateMessage::from(&ev);
            let delivered = hub.broadcast(&message).await;
            debug!("📬️ Payment {} is {}. {delivered} client(s) notified.", ev.payment_id, ev.status);
        })
    });
    EventHandlers::new(REALTIME_EVENT_BUFFER_SIZE, hooks)
}

#[get("/ws")]
pub async fn ws_entry(
    req: HttpRequest,
    stream: web::Payload,
    hub: web::Data<WsHub>,
) -> actix_web::Result<HttpResponse> {
    let (response, session, messages) = actix_ws::handle(&req, stream).map_err(|e| {
        warn!("📡️ WebSocket upgrade failed. {e}");
        e
    })?;
    let hub = hub.into_inner();
    let id = hub.register(WsSubscriber::new(session.clone())).await;
    actix_web::rt::spawn(async move {
        run_session(session, messages).await;
        hub.unregister(id).await;
    });
    Ok(response)
}

enum SessionEnd {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    Network(Closed),
}

async fn run_session(mut session: Session, mut messages: MessageStream) {
    let mut last_heartbeat = Instant::now();
    let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);
    let end = loop {
        let result = tokio::select! {
            _ = heartbeat.tick() => {
                if Instant::now().duration_since(last_heartbeat) > CLIENT_TIMEOUT {
                    Err(SessionEnd::HeartbeatTimeout)
                } else {
                    session.ping(b"").await.map_err(SessionEnd::Network)
                }
            }
            message = messages.recv() => match message {
                Some(Ok(message)) => {
                    last_heartbeat = Instant::now();
                    handle_message(&mut session, message).await
                },
                Some(Err(e)) => Err(SessionEnd::Protocol(e)),
                None => Err(SessionEnd::StreamClosed),
            }
        };
        if let Err(end) = result {
            break end;
        }
    };
    let reason = match end {
        SessionEnd::HeartbeatTimeout => {
            debug!("📡️ WebSocket heartbeat timeout. Closing connection.");
            Some(CloseReason { code: CloseCode::Normal, description: Some("heartbeat timeout".into()) })
        },
        SessionEnd::Protocol(e) => {
            warn!("📡️ WebSocket protocol error. {e}");
            Some(CloseReason { code: CloseCode::Protocol, description: Some("protocol error".into()) })
        },
        SessionEnd::ClientClosed(reason) => reason,
        SessionEnd::StreamClosed | SessionEnd::Network(_) => return,
    };
    if let Err(e) = session.close(reason).await {
        trace!("📡️ WebSocket was already closed. {e:?}");
    }
}

async fn handle_message(session: &mut Session, message: Message) -> Result<(), SessionEnd> {
    match message {
        Message::Ping(payload) => session.pong(&payload).await.map_err(SessionEnd::Network),
        Message::Text(text) if text.trim() == "ping" => session.text("pong").await.map_err(SessionEnd::Network),
        Message::Text(text) => {
            trace!("📡️ Ignoring client message: {text}");
            Ok(())
        },
        Message::Close(reason) => Err(SessionEnd::ClientClosed(reason)),
        Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => Ok(()),
    }
}
