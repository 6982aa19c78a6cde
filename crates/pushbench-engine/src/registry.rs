//! Live sessions of one transport kind.

use std::sync::Arc;

use dashmap::DashMap;
use pushbench_core::{ConnectionId, EventType, Transport, TransportKind};
use pushbench_telemetry::MetricsAggregator;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionConfig, SessionStats};

pub(crate) type SessionMap = DashMap<ConnectionId, Arc<Session>>;

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Tracks the sessions of one transport and fans messages out to them.
///
/// Sessions remove themselves on close through a weak handle to the map.
/// Sessions whose peer vanished without a close are pruned lazily whenever
/// the registry is read.
pub struct ConnectionRegistry {
    kind: TransportKind,
    sessions: Arc<SessionMap>,
    metrics: Arc<MetricsAggregator>,
    config: SessionConfig,
}

impl ConnectionRegistry {
    /// Empty registry whose sessions report into `metrics`.
    pub fn new(kind: TransportKind, metrics: Arc<MetricsAggregator>, config: SessionConfig) -> Self {
        Self {
            kind,
            sessions: Arc::new(DashMap::new()),
            metrics,
            config,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Register a new connection, greet it with `connected` and start its timers.
    pub fn add_session(&self, transport: Box<dyn Transport>) -> Arc<Session> {
        if transport.kind() != self.kind {
            warn!(
                registry = %self.kind,
                transport = %transport.kind(),
                "transport kind does not match registry"
            );
        }
        let id = ConnectionId::new();
        let session = Arc::new(Session::new(
            id.clone(),
            transport,
            self.metrics.clone(),
            Arc::downgrade(&self.sessions),
            self.config,
        ));
        let _ = self.sessions.insert(id.clone(), session.clone());
        self.metrics.add_connection();
        info!(conn_id = %id, transport = %self.kind, "session opened");

        let greeting = serde_json::json!({
            "connectionId": id,
            "timestamp": pushbench_core::clock::now_millis(),
            "type": self.kind,
        });
        if !session.send(EventType::Connected, &greeting) {
            warn!(conn_id = %id, "failed to deliver connected event");
        }
        session.start_timers();
        session
    }

    /// Close and forget a session. Unknown ids are ignored.
    pub fn remove_session(&self, id: &ConnectionId) {
        if let Some((_, session)) = self.sessions.remove(id) {
            session.close();
        }
    }

    /// Look up a registered session without pruning.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Send to every live session, pruning dead ones first.
    pub fn broadcast<P>(&self, event_type: impl Into<EventType>, payload: &P) -> BroadcastResult
    where
        P: Serialize + ?Sized,
    {
        let event_type = event_type.into();
        let sessions = self.live_sessions();
        let mut result = BroadcastResult {
            total: sessions.len(),
            ..BroadcastResult::default()
        };
        for session in &sessions {
            if session.send(event_type.clone(), payload) {
                result.succeeded += 1;
            } else {
                result.failed += 1;
            }
        }
        debug!(
            transport = %self.kind,
            %event_type,
            total = result.total,
            failed = result.failed,
            "broadcast"
        );
        result
    }

    /// Snapshots of every live session, pruning dead ones first.
    pub fn stats(&self) -> Vec<SessionStats> {
        self.live_sessions().iter().map(|s| s.stats()).collect()
    }

    /// Number of live sessions after pruning.
    pub fn active_count(&self) -> usize {
        self.live_sessions().len()
    }

    /// Close every session. Used on shutdown.
    pub fn close_all(&self) {
        let sessions: Vec<Arc<Session>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        let count = sessions.len();
        for session in sessions {
            session.close();
        }
        self.sessions.clear();
        info!(transport = %self.kind, count, "closed all sessions");
    }

    /// Snapshot of connected sessions. Disconnected entries are closed and
    /// dropped from the map.
    fn live_sessions(&self) -> Vec<Arc<Session>> {
        let snapshot: Vec<Arc<Session>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        let mut live = Vec::with_capacity(snapshot.len());
        for session in snapshot {
            if session.is_connected() {
                live.push(session);
            } else {
                debug!(conn_id = %session.id(), "pruning disconnected session");
                session.close();
                let _ = self.sessions.remove(session.id());
            }
        }
        live
    }
}
