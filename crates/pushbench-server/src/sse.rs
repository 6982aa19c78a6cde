//! Server-Sent Events adapter and the `/events` endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{HeaderName, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures::Stream;
use pushbench_core::{EventType, Frame, Transport, TransportError, TransportKind};
use pushbench_engine::{ChannelSink, Session};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::server::AppState;

/// Writes frames as SSE events into the response body stream.
pub struct SseTransport {
    sink: ChannelSink<Event>,
}

impl SseTransport {
    pub fn new(queue: usize) -> (Self, ReceiverStream<Event>) {
        let (sink, rx) = ChannelSink::channel(queue);
        (Self { sink }, ReceiverStream::new(rx))
    }
}

/// Map a frame onto `id: <messageId>\nevent: <type>\ndata: <json>\n\n`.
pub fn frame_event(frame: &Frame) -> Event {
    // Event names must fit on one line.
    let name: String = frame
        .event_type()
        .as_str()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();
    Event::default()
        .id(frame.message_id().to_string())
        .event(name)
        .data(&frame.json)
}

impl Transport for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    fn write(&self, frame: &Frame) -> Result<(), TransportError> {
        self.sink.push(frame_event(frame))
    }

    fn close(&self) {
        self.sink.close();
    }

    fn is_open(&self) -> bool {
        self.sink.is_open()
    }
}

/// Closes the session when the response body is dropped, i.e. the client left.
struct DisconnectGuard(Arc<Session>);

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        debug!(conn_id = %self.0.id(), "sse stream dropped");
        self.0.close();
    }
}

fn session_stream(
    events: ReceiverStream<Event>,
    session: Arc<Session>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = DisconnectGuard(session);
    events.map(move |event| {
        let _held = &guard;
        Ok(event)
    })
}

/// GET /events
pub async fn events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (transport, events) = SseTransport::new(state.settings.max_send_queue);
    let session = state.sse.add_session(Box::new(transport));
    if let Some(current) = state.producer.current_data() {
        let _ = session.send(EventType::Data, &current);
    }

    let headers = [
        (
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        ),
        (
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate, no-transform"),
        ),
    ];
    (headers, Sse::new(session_stream(events, session)))
}
