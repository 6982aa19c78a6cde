//! Per-transport counters and the SSE vs WebSocket comparison.

use std::time::Instant;

use parking_lot::Mutex;
use pushbench_core::clock;
use pushbench_core::TransportKind;
use serde::Serialize;

use crate::latency::LatencySampler;

/// Rough per-connection memory cost, in bytes, used by the comparison view.
const SSE_CONNECTION_BYTES: u64 = 1024;
const WS_CONNECTION_BYTES: u64 = 2048;

#[derive(Debug, Default)]
struct Counters {
    total_messages: u64,
    total_bytes: u64,
    total_frames: u64,
    total_frame_bytes: u64,
    frames_received: u64,
    bytes_received: u64,
    connections_created: u64,
    connections_active: u64,
    errors: u64,
    latency: LatencySampler,
}

/// Point-in-time view of one transport's performance counters.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub transport: TransportKind,
    pub total_messages: u64,
    pub total_bytes: u64,
    pub connections_active: u64,
    pub connections_created: u64,
    pub average_latency: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub messages_per_second: f64,
    pub bytes_per_second: f64,
    pub errors: u64,
    /// Every frame written, control traffic included.
    pub total_frames: u64,
    pub frames_received: u64,
    /// Percentage of frames (sent + received) that were not data.
    pub connection_overhead: u64,
    /// Percentage of bytes (sent + received) that were data.
    pub network_usage: u64,
    pub uptime_ms: u64,
}

/// Per-transport performance counters.
///
/// Only data-carrying frames feed `total_messages`, `total_bytes` and the
/// latency history; control frames are tracked separately so overhead can be
/// reported without polluting throughput.
pub struct MetricsAggregator {
    kind: TransportKind,
    start_time: Instant,
    counters: Mutex<Counters>,
}

impl MetricsAggregator {
    /// Empty counters with the rate clock starting now.
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            start_time: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Count a newly opened session.
    pub fn add_connection(&self) {
        let mut c = self.counters.lock();
        c.connections_created += 1;
        c.connections_active += 1;
    }

    /// Decrement the active count, never below zero.
    pub fn remove_connection(&self) {
        let mut c = self.counters.lock();
        c.connections_active = c.connections_active.saturating_sub(1);
    }

    /// Record one frame written to a client.
    pub fn record_message(&self, size_bytes: usize, timestamp_ms: i64, is_data: bool) {
        let size = size_bytes as u64;
        let mut c = self.counters.lock();
        c.total_frames += 1;
        c.total_frame_bytes += size;
        if is_data {
            c.total_messages += 1;
            c.total_bytes += size;
            c.latency.record(clock::millis_since(timestamp_ms));
        }
    }

    /// Record one frame received from a client.
    pub fn record_received(&self, size_bytes: usize) {
        let mut c = self.counters.lock();
        c.frames_received += 1;
        c.bytes_received += size_bytes as u64;
    }

    /// Count a failed send.
    pub fn record_error(&self) {
        self.counters.lock().errors += 1;
    }

    /// Zero every counter and the latency history between runs.
    ///
    /// `connections_active` tracks live sessions and is left alone.
    pub fn reset_counters(&self) {
        let mut c = self.counters.lock();
        c.total_messages = 0;
        c.total_bytes = 0;
        c.total_frames = 0;
        c.total_frame_bytes = 0;
        c.frames_received = 0;
        c.bytes_received = 0;
        c.connections_created = 0;
        c.errors = 0;
        c.latency.clear();
        tracing::info!(transport = %self.kind, "performance counters reset");
    }

    /// Current counters with rates derived from time since construction.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Like [`snapshot`](Self::snapshot) with an explicit clock reading.
    pub fn snapshot_at(&self, now: Instant) -> MetricsSnapshot {
        let c = self.counters.lock();
        let elapsed = now.saturating_duration_since(self.start_time);
        let secs = elapsed.as_secs_f64();
        let rate = |n: u64| if secs > 0.0 { n as f64 / secs } else { 0.0 };
        let latency = c.latency.stats();

        let all_frames = c.total_frames + c.frames_received;
        let connection_overhead = percent(all_frames.saturating_sub(c.total_messages), all_frames);
        let all_bytes = c.total_frame_bytes + c.bytes_received;
        let network_usage = percent(c.total_bytes, all_bytes);

        MetricsSnapshot {
            transport: self.kind,
            total_messages: c.total_messages,
            total_bytes: c.total_bytes,
            connections_active: c.connections_active,
            connections_created: c.connections_created,
            average_latency: latency.avg,
            min_latency: latency.min,
            max_latency: latency.max,
            messages_per_second: rate(c.total_messages),
            bytes_per_second: rate(c.total_bytes),
            errors: c.errors,
            total_frames: c.total_frames,
            frames_received: c.frames_received,
            connection_overhead,
            network_usage,
            uptime_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn percent(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u64
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatencyComparison {
    pub sse: f64,
    pub websocket: f64,
    pub winner: TransportKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThroughputComparison {
    pub sse: f64,
    pub websocket: f64,
    pub winner: TransportKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEstimate {
    pub connections: u64,
    pub memory_estimate: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub sse: ResourceEstimate,
    pub websocket: ResourceEstimate,
}

/// Side-by-side view of the two transports.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub latency_comparison: LatencyComparison,
    pub throughput_comparison: ThroughputComparison,
    pub resource_usage: ResourceUsage,
}

/// Derive the comparison view from one snapshot per transport.
///
/// Lower average latency wins; higher messages/sec wins. Ties go to WebSocket.
pub fn compare(sse: &MetricsSnapshot, websocket: &MetricsSnapshot) -> Comparison {
    let latency_winner = if sse.average_latency < websocket.average_latency {
        TransportKind::Sse
    } else {
        TransportKind::WebSocket
    };
    let throughput_winner = if sse.messages_per_second > websocket.messages_per_second {
        TransportKind::Sse
    } else {
        TransportKind::WebSocket
    };

    Comparison {
        latency_comparison: LatencyComparison {
            sse: sse.average_latency,
            websocket: websocket.average_latency,
            winner: latency_winner,
        },
        throughput_comparison: ThroughputComparison {
            sse: sse.messages_per_second,
            websocket: websocket.messages_per_second,
            winner: throughput_winner,
        },
        resource_usage: ResourceUsage {
            sse: ResourceEstimate {
                connections: sse.connections_active,
                memory_estimate: sse.connections_active * SSE_CONNECTION_BYTES,
            },
            websocket: ResourceEstimate {
                connections: websocket.connections_active,
                memory_estimate: websocket.connections_active * WS_CONNECTION_BYTES,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn now_ms() -> i64 {
        clock::now_millis()
    }

    #[test]
    fn connection_counts() {
        let m = MetricsAggregator::new(TransportKind::Sse);
        m.add_connection();
        m.add_connection();
        m.remove_connection();
        let s = m.snapshot();
        assert_eq!(s.connections_created, 2);
        assert_eq!(s.connections_active, 1);
    }

    #[test]
    fn remove_connection_floors_at_zero() {
        let m = MetricsAggregator::new(TransportKind::WebSocket);
        m.remove_connection();
        m.remove_connection();
        assert_eq!(m.snapshot().connections_active, 0);
    }

    #[test]
    fn control_frames_do_not_count_as_messages() {
        let m = MetricsAggregator::new(TransportKind::Sse);
        m.record_message(120, now_ms(), false);
        let s = m.snapshot();
        assert_eq!(s.total_messages, 0);
        assert_eq!(s.total_bytes, 0);
        assert_eq!(s.total_frames, 1);
        assert_eq!(s.average_latency, 0.0);
    }

    #[test]
    fn data_frames_count_bytes_exactly() {
        let m = MetricsAggregator::new(TransportKind::Sse);
        m.record_message(500, now_ms(), true);
        m.record_message(250, now_ms(), true);
        let s = m.snapshot();
        assert_eq!(s.total_messages, 2);
        assert_eq!(s.total_bytes, 750);
    }

    #[test]
    fn latency_history_from_timestamps() {
        let m = MetricsAggregator::new(TransportKind::WebSocket);
        m.record_message(10, now_ms() - 40, true);
        m.record_message(10, now_ms() - 20, true);
        let s = m.snapshot();
        assert!(s.min_latency >= 20);
        assert!(s.max_latency >= 40);
        assert!(s.average_latency >= 30.0);
    }

    #[test]
    fn latency_history_bounded() {
        let m = MetricsAggregator::new(TransportKind::Sse);
        for _ in 0..150 {
            m.record_message(1, now_ms(), true);
        }
        assert_eq!(m.counters.lock().latency.len(), 100);
        assert_eq!(m.snapshot().total_messages, 150);
    }

    #[test]
    fn rates_use_elapsed_since_start() {
        let m = MetricsAggregator::new(TransportKind::Sse);
        for _ in 0..30 {
            m.record_message(100, now_ms(), true);
        }
        let s = m.snapshot_at(m.start_time() + Duration::from_secs(2));
        assert!((s.messages_per_second - 15.0).abs() < 1e-9);
        assert!((s.bytes_per_second - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn rates_zero_when_no_time_elapsed() {
        let m = MetricsAggregator::new(TransportKind::Sse);
        m.record_message(100, now_ms(), true);
        let s = m.snapshot_at(m.start_time());
        assert_eq!(s.messages_per_second, 0.0);
        assert_eq!(s.bytes_per_second, 0.0);
    }

    #[test]
    fn overhead_and_network_usage() {
        let m = MetricsAggregator::new(TransportKind::WebSocket);
        m.record_message(100, now_ms(), true);
        m.record_message(100, now_ms(), false);
        m.record_message(100, now_ms(), false);
        m.record_received(100);
        let s = m.snapshot();
        assert_eq!(s.connection_overhead, 75);
        assert_eq!(s.network_usage, 25);
    }

    #[test]
    fn reset_keeps_active_connections() {
        let m = MetricsAggregator::new(TransportKind::Sse);
        m.add_connection();
        m.add_connection();
        m.record_message(64, now_ms(), true);
        m.record_error();
        m.reset_counters();
        let s = m.snapshot();
        assert_eq!(s.total_messages, 0);
        assert_eq!(s.total_bytes, 0);
        assert_eq!(s.errors, 0);
        assert_eq!(s.connections_created, 0);
        assert_eq!(s.total_frames, 0);
        assert_eq!(s.average_latency, 0.0);
        assert_eq!(s.connections_active, 2);
        assert!(m.counters.lock().latency.is_empty());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let m = MetricsAggregator::new(TransportKind::WebSocket);
        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["transport"], "websocket");
        assert!(json.get("totalMessages").is_some());
        assert!(json.get("messagesPerSecond").is_some());
        assert!(json.get("averageLatency").is_some());
    }

    fn snapshot(kind: TransportKind, latency: f64, mps: f64, active: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            transport: kind,
            total_messages: 0,
            total_bytes: 0,
            connections_active: active,
            connections_created: active,
            average_latency: latency,
            min_latency: 0,
            max_latency: 0,
            messages_per_second: mps,
            bytes_per_second: 0.0,
            errors: 0,
            total_frames: 0,
            frames_received: 0,
            connection_overhead: 0,
            network_usage: 0,
            uptime_ms: 0,
        }
    }

    #[test]
    fn comparison_winners() {
        let sse = snapshot(TransportKind::Sse, 3.0, 12.0, 2);
        let ws = snapshot(TransportKind::WebSocket, 5.0, 10.0, 3);
        let cmp = compare(&sse, &ws);
        assert_eq!(cmp.latency_comparison.winner, TransportKind::Sse);
        assert_eq!(cmp.throughput_comparison.winner, TransportKind::Sse);
        assert_eq!(cmp.resource_usage.sse.memory_estimate, 2048);
        assert_eq!(cmp.resource_usage.websocket.memory_estimate, 6144);
    }

    #[test]
    fn comparison_ties_go_to_websocket() {
        let sse = snapshot(TransportKind::Sse, 4.0, 10.0, 0);
        let ws = snapshot(TransportKind::WebSocket, 4.0, 10.0, 0);
        let cmp = compare(&sse, &ws);
        assert_eq!(cmp.latency_comparison.winner, TransportKind::WebSocket);
        assert_eq!(cmp.throughput_comparison.winner, TransportKind::WebSocket);
    }

    #[test]
    fn comparison_serializes() {
        let sse = snapshot(TransportKind::Sse, 1.0, 1.0, 1);
        let ws = snapshot(TransportKind::WebSocket, 2.0, 2.0, 1);
        let json = serde_json::to_value(compare(&sse, &ws)).unwrap();
        assert_eq!(json["latencyComparison"]["winner"], "sse");
        assert_eq!(json["throughputComparison"]["winner"], "websocket");
        assert_eq!(json["resourceUsage"]["websocket"]["memoryEstimate"], 2048);
    }

    #[test]
    fn concurrent_recording() {
        use std::sync::Arc;
        use std::thread;

        let m = Arc::new(MetricsAggregator::new(TransportKind::Sse));
        let mut handles = vec![];
        for _ in 0..8 {
            let m = m.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    m.record_message(10, clock::now_millis(), true);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.snapshot().total_messages, 4000);
        assert_eq!(m.snapshot().total_bytes, 40_000);
    }
}
