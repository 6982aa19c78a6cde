//! WebSocket adapter and the `/websocket` endpoint.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use pushbench_core::{EventType, Frame, Transport, TransportError, TransportKind};
use pushbench_engine::{ChannelSink, Session};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::server::AppState;

/// Hands text and protocol ping frames to the connection's writer task.
pub struct WsTransport {
    sink: ChannelSink<Message>,
}

impl WsTransport {
    pub fn new(queue: usize) -> (Self, mpsc::Receiver<Message>) {
        let (sink, rx) = ChannelSink::channel(queue);
        (Self { sink }, rx)
    }
}

impl Transport for WsTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn write(&self, frame: &Frame) -> Result<(), TransportError> {
        self.sink.push(Message::Text(frame.json.clone().into()))
    }

    fn close(&self) {
        self.sink.close();
    }

    fn is_open(&self) -> bool {
        self.sink.is_open()
    }

    fn ping(&self) -> Result<(), TransportError> {
        self.sink.push(Message::Ping(Default::default()))
    }
}

/// GET /websocket
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (transport, mut outgoing) = WsTransport::new(state.settings.max_send_queue);
    let session = state.websocket.add_session(Box::new(transport));
    if let Some(current) = state.producer.current_data() {
        let _ = session.send(EventType::Data, &current);
    }

    // Writer: drains the queue until the session drops its sender.
    let writer_id = session.id().clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!(conn_id = %writer_id, error = %e, "websocket write failed");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let shutdown = state.shutdown.token();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            incoming = ws_rx.next() => {
                if !dispatch(&session, incoming) {
                    break;
                }
            }
        }
    }

    session.close();
    let _ = writer.await;
}

/// Apply one read result to the session. Returns false when the socket is done.
fn dispatch(session: &Arc<Session>, incoming: Option<Result<Message, axum::Error>>) -> bool {
    match incoming {
        Some(Ok(Message::Text(text))) => {
            session.handle_incoming(text.as_str());
            true
        }
        Some(Ok(Message::Pong(_))) => {
            session.record_pong();
            true
        }
        Some(Ok(Message::Close(_))) | None => {
            debug!(conn_id = %session.id(), "websocket closed by client");
            false
        }
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            warn!(conn_id = %session.id(), error = %e, "websocket read error");
            false
        }
    }
}
