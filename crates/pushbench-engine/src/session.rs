//! One client connection, independent of the wire it runs over.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use pushbench_core::{
    clock, ConnectionId, Envelope, EventType, Frame, SendError, Transport, TransportKind,
};
use pushbench_telemetry::{LatencySampler, LatencyStats, MetricsAggregator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::limiter::{RateLimitPolicy, RateLimiter};
use crate::registry::SessionMap;

/// Timer and limiter settings applied to every new session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub heartbeat_interval: Duration,
    pub refill_interval: Duration,
    pub rate_limit: RateLimitPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            refill_interval: Duration::from_secs(1),
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

/// Lifecycle position. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Connected,
    Closing,
    Closed,
}

const CONNECTED: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

#[derive(Clone, Copy, Debug, Default)]
struct Quality {
    successful_sends: u64,
    failed_sends: u64,
    avg_response_time_ms: f64,
}

struct SessionState {
    sequence: u64,
    limiter: RateLimiter,
    latency: LatencySampler,
    quality: Quality,
    messages_received: u64,
    last_ping: Option<i64>,
    last_pong: Option<i64>,
}

/// Send-quality counters for one session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityStats {
    pub successful_sends: u64,
    pub failed_sends: u64,
    /// Percentage of attempts that reached the transport, 100 when none were made.
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub total_messages: u64,
}

/// Snapshot returned by the connection listing endpoints.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub id: ConnectionId,
    pub transport: TransportKind,
    pub phase: SessionPhase,
    pub connected: bool,
    pub connected_at: i64,
    pub uptime_ms: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub last_ping: Option<i64>,
    pub last_pong: Option<i64>,
    pub rate_limit_tokens: u32,
    pub quality: QualityStats,
    pub latency: LatencyStats,
}

#[derive(Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// A live client connection.
///
/// Sequencing, rate limiting and the transport write all happen under one
/// lock, so message ids reach the wire in increasing order. Closing is
/// idempotent: the first caller releases the timers, the transport, the
/// metrics slot and the registry entry; later callers are no-ops.
pub struct Session {
    id: ConnectionId,
    kind: TransportKind,
    connected_at: i64,
    started: Instant,
    phase: AtomicU8,
    state: Mutex<SessionState>,
    transport: Box<dyn Transport>,
    metrics: Arc<MetricsAggregator>,
    registry: Weak<SessionMap>,
    timers: CancellationToken,
    config: SessionConfig,
}

impl Session {
    pub(crate) fn new(
        id: ConnectionId,
        transport: Box<dyn Transport>,
        metrics: Arc<MetricsAggregator>,
        registry: Weak<SessionMap>,
        config: SessionConfig,
    ) -> Self {
        Self {
            id,
            kind: transport.kind(),
            connected_at: clock::now_millis(),
            started: Instant::now(),
            phase: AtomicU8::new(CONNECTED),
            state: Mutex::new(SessionState {
                sequence: 0,
                limiter: RateLimiter::new(config.rate_limit),
                latency: LatencySampler::new(),
                quality: Quality::default(),
                messages_received: 0,
                last_ping: None,
                last_pong: None,
            }),
            transport,
            metrics,
            registry,
            timers: CancellationToken::new(),
            config,
        }
    }

    /// Identifier assigned at creation.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Transport this session runs over.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Current lifecycle position.
    pub fn phase(&self) -> SessionPhase {
        match self.phase.load(Ordering::SeqCst) {
            CONNECTED => SessionPhase::Connected,
            CLOSING => SessionPhase::Closing,
            _ => SessionPhase::Closed,
        }
    }

    /// Connected and the transport still reports an open peer.
    pub fn is_connected(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == CONNECTED && self.transport.is_open()
    }

    /// Send a message, reporting only whether it was accepted.
    pub fn send<P>(&self, event_type: impl Into<EventType>, payload: &P) -> bool
    where
        P: Serialize + ?Sized,
    {
        self.try_send(event_type, payload).is_ok()
    }

    /// Send a message and return its id.
    ///
    /// A rate-limited attempt consumes no sequence number and is not counted
    /// as a failure. Any attempt that passes the limiter gets the next id,
    /// whether or not the transport accepts it.
    pub fn try_send<P>(&self, event_type: impl Into<EventType>, payload: &P) -> Result<u64, SendError>
    where
        P: Serialize + ?Sized,
    {
        let event_type = event_type.into();
        let mut state = self.state.lock();
        if !self.is_connected() {
            debug!(conn_id = %self.id, %event_type, "send on disconnected session");
            return Err(SendError::Disconnected);
        }
        if !state.limiter.try_consume() {
            let err = SendError::RateLimited;
            warn!(conn_id = %self.id, %event_type, error_kind = err.error_kind(), "rate limit exceeded");
            return Err(err);
        }

        state.sequence += 1;
        let message_id = state.sequence;
        let started = std::time::Instant::now();

        let frame = serde_json::to_value(payload).and_then(|data| {
            Frame::new(Envelope {
                event_type: event_type.clone(),
                data,
                message_id,
                timestamp: clock::now_millis(),
                connection_id: self.id.clone(),
            })
        });
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                state.quality.failed_sends += 1;
                drop(state);
                self.metrics.record_error();
                let err = SendError::Payload(e);
                warn!(conn_id = %self.id, %event_type, error_kind = err.error_kind(), error = %err, "failed to serialize payload");
                return Err(err);
            }
        };

        match self.transport.write(&frame) {
            Ok(()) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let q = &mut state.quality;
                q.successful_sends += 1;
                q.avg_response_time_ms +=
                    (elapsed_ms as f64 - q.avg_response_time_ms) / q.successful_sends as f64;
                state.latency.record(elapsed_ms);
                drop(state);
                self.metrics.record_message(
                    frame.len(),
                    frame.envelope.timestamp,
                    event_type.carries_data(),
                );
                Ok(message_id)
            }
            Err(e) => {
                state.quality.failed_sends += 1;
                drop(state);
                self.metrics.record_error();
                let fatal = e.is_fatal();
                let err = SendError::Transport(e);
                if fatal {
                    warn!(conn_id = %self.id, %event_type, error_kind = err.error_kind(), "transport closed during send");
                    self.close();
                } else {
                    debug!(conn_id = %self.id, %event_type, message_id, error_kind = err.error_kind(), "send queue full, frame dropped");
                }
                Err(err)
            }
        }
    }

    /// Probe the wire, then send a `ping` carrying the current time.
    ///
    /// `last_ping` moves only when the `ping` frame was accepted. A dead wire
    /// during the probe is handled like a failed write.
    pub fn heartbeat(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        if let Err(e) = self.transport.ping() {
            if e.is_fatal() {
                self.state.lock().quality.failed_sends += 1;
                self.metrics.record_error();
                warn!(conn_id = %self.id, "transport closed during heartbeat");
                self.close();
                return false;
            }
            debug!(conn_id = %self.id, error = %e, "protocol ping skipped");
        }

        let now = clock::now_millis();
        let sent = self.send(
            EventType::Ping,
            &json!({ "timestamp": now, "connectionId": self.id }),
        );
        if sent {
            self.state.lock().last_ping = Some(now);
        }
        sent
    }

    /// Note that the client answered a ping.
    pub fn record_pong(&self) {
        self.state.lock().last_pong = Some(clock::now_millis());
    }

    /// Top up the rate limiter from elapsed time.
    pub fn refill(&self) {
        self.state.lock().limiter.refill();
    }

    /// Handle one text frame from the client.
    ///
    /// Malformed frames and unknown message types are logged and dropped; they
    /// never close the session.
    pub fn handle_incoming(&self, text: &str) {
        self.state.lock().messages_received += 1;
        self.metrics.record_received(text.len());

        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "malformed client message");
                return;
            }
        };

        match message.kind.as_str() {
            "ping" => {
                let _ = self.send(EventType::Pong, &json!({ "timestamp": clock::now_millis() }));
            }
            "pong" => self.record_pong(),
            "request_data" => {
                let _ = self.send("data_response", &message.data);
            }
            "performance_test" => {
                let reply = stamp_server_time(message.data, clock::now_millis());
                let _ = self.send("performance_response", &reply);
            }
            other => debug!(conn_id = %self.id, kind = other, "unknown client message type"),
        }
    }

    /// Client frames handled so far, malformed ones included.
    pub fn messages_received(&self) -> u64 {
        self.state.lock().messages_received
    }

    /// Transition to closed, releasing everything the session holds.
    pub fn close(&self) {
        if self
            .phase
            .compare_exchange(CONNECTED, CLOSING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.timers.cancel();
        self.transport.close();
        self.metrics.remove_connection();
        if let Some(map) = self.registry.upgrade() {
            let _ = map.remove(&self.id);
        }
        self.phase.store(CLOSED, Ordering::SeqCst);
        info!(conn_id = %self.id, transport = %self.kind, "session closed");
    }

    /// Snapshot for the connection listing. Tokens are floored.
    pub fn stats(&self) -> SessionStats {
        let state = self.state.lock();
        let q = state.quality;
        let attempts = q.successful_sends + q.failed_sends;
        let success_rate = if attempts == 0 {
            100.0
        } else {
            q.successful_sends as f64 / attempts as f64 * 100.0
        };
        SessionStats {
            id: self.id.clone(),
            transport: self.kind,
            phase: self.phase(),
            connected: self.is_connected(),
            connected_at: self.connected_at,
            uptime_ms: self.started.elapsed().as_millis() as u64,
            messages_sent: state.sequence,
            messages_received: state.messages_received,
            last_ping: state.last_ping,
            last_pong: state.last_pong,
            rate_limit_tokens: state.limiter.remaining(),
            quality: QualityStats {
                successful_sends: q.successful_sends,
                failed_sends: q.failed_sends,
                success_rate,
                avg_response_time: q.avg_response_time_ms,
                total_messages: state.sequence,
            },
            latency: state.latency.stats(),
        }
    }

    /// Spawn the heartbeat and refill tickers.
    ///
    /// Tickers hold only a weak reference and stop on close, so they never
    /// keep a dropped session alive. Without a runtime nothing is spawned.
    pub(crate) fn start_timers(self: &Arc<Self>) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(conn_id = %self.id, "no async runtime, session timers not started");
            return;
        }
        self.spawn_ticker(self.config.heartbeat_interval, |s| {
            let _ = s.heartbeat();
        });
        self.spawn_ticker(self.config.refill_interval, Session::refill);
    }

    fn spawn_ticker(self: &Arc<Self>, period: Duration, on_tick: fn(&Session)) {
        if period.is_zero() {
            return;
        }
        let session = Arc::downgrade(self);
        let cancel = self.timers.clone();
        drop(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(session) = session.upgrade() else { break };
                        on_tick(&session);
                    }
                }
            }
        }));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.timers.cancel();
    }
}

fn stamp_server_time(data: Value, now: i64) -> Value {
    match data {
        Value::Object(mut map) => {
            let _ = map.insert("serverTimestamp".into(), json!(now));
            Value::Object(map)
        }
        Value::Null => json!({ "serverTimestamp": now }),
        other => json!({ "payload": other, "serverTimestamp": now }),
    }
}
