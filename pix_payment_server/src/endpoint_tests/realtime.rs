use std::{net::TcpListener, time::Duration};

use actix_web::{dev::ServerHandle, web, App, HttpServer};
use awc::{
    ws::{Codec, Frame, Message},
    BoxedSocket,
};
use futures::{SinkExt, StreamExt};
use pix_payment_engine::{
    db_types::PaymentStatus,
    events::{EventProducers, PaymentUpdatedEvent},
};
use serde_json::{json, Value};

use crate::ws::{create_realtime_event_handlers, ws_entry, WsHub};

type WsClient = actix_codec::Framed<BoxedSocket, Codec>;

struct RealtimeServer {
    url: String,
    handle: ServerHandle,
    hub: web::Data<WsHub>,
    producers: EventProducers,
}

impl RealtimeServer {
    async fn start() -> Self {
        let _ = env_logger::try_init();
        let hub = web::Data::new(WsHub::new());
        let handlers = create_realtime_event_handlers(hub.clone().into_inner());
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let app_hub = hub.clone();
        let server = HttpServer::new(move || App::new().app_data(app_hub.clone()).service(ws_entry))
            .workers(1)
            .listen(listener)
            .expect("bind test server")
            .disable_signals()
            .run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        Self { url: format!("http://{addr}"), handle, hub, producers }
    }

    async fn connect(&self) -> WsClient {
        let (_resp, socket) =
            awc::Client::default().ws(format!("{}/ws", self.url)).connect().await.expect("websocket connect");
        socket
    }

    async fn wait_for_clients(&self, expected: usize) {
        for _ in 0..100 {
            if self.hub.len().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {expected} connected client(s), found {}", self.hub.len().await);
    }
}

async fn next_text(socket: &mut WsClient) -> String {
    let read = async {
        loop {
            match socket.next().await.expect("connection closed").expect("bad frame") {
                Frame::Text(bytes) => return String::from_utf8(bytes.to_vec()).expect("utf-8 text"),
                Frame::Ping(_) | Frame::Pong(_) => continue,
                other => panic!("expected a text frame, got {other:?}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read).await.expect("no message within 5s")
}

#[actix_web::test]
async fn ping_gets_pong() {
    let server = RealtimeServer::start().await;
    let mut socket = server.connect().await;
    socket.send(Message::Text("hello".into())).await.expect("send text");
    socket.send(Message::Text("ping".into())).await.expect("send text");
    assert_eq!(next_text(&mut socket).await, "pong");
    server.handle.stop(false).await;
}

#[actix_web::test]
async fn payment_updates_reach_every_connected_client() {
    let server = RealtimeServer::start().await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;
    server.wait_for_clients(2).await;

    let approved = PaymentUpdatedEvent::new("PAY1", PaymentStatus::Approved, Some("A1".into()));
    server.producers.publish_payment_updated(approved).await;
    let expected = json!({"type": "payment_update", "payload": {"id": "PAY1", "status": "approved", "orderId": "A1"}});
    for socket in [&mut first, &mut second] {
        let message: Value = serde_json::from_str(&next_text(socket).await).expect("json message");
        assert_eq!(message, expected);
    }

    // Closed connections leave the hub and the rest keep receiving updates
    second.send(Message::Close(None)).await.expect("send close");
    server.wait_for_clients(1).await;
    server.producers.publish_payment_updated(PaymentUpdatedEvent::new("PAY2", PaymentStatus::Rejected, None)).await;
    let message: Value = serde_json::from_str(&next_text(&mut first).await).expect("json message");
    assert_eq!(message["payload"]["id"], "PAY2");
    assert_eq!(message["payload"]["status"], "rejected");
    server.handle.stop(false).await;
}
