//! Forwards producer output to connection registries.

use std::sync::Arc;

use pushbench_core::EventType;
use tracing::trace;

use crate::registry::ConnectionRegistry;
use crate::scenario::ScenarioProducer;

/// Subscribe every registry to the producer: payloads go out as `data`,
/// progress summaries as `metrics`.
pub fn bridge(producer: &ScenarioProducer, registries: &[Arc<ConnectionRegistry>]) {
    for registry in registries {
        let data_target = registry.clone();
        producer.subscribe_data(move |payload| {
            let result = data_target.broadcast(EventType::Data, payload);
            trace!(transport = %data_target.kind(), total = result.total, failed = result.failed, "forwarded data");
        });

        let metrics_target = registry.clone();
        producer.subscribe_metrics(move |summary| {
            let _ = metrics_target.broadcast(EventType::Metrics, summary);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::session::SessionConfig;
    use pushbench_core::TransportKind;
    use pushbench_telemetry::MetricsAggregator;
    use serde_json::json;
    use std::time::Duration;

    fn registry(kind: TransportKind) -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new(
            kind,
            Arc::new(MetricsAggregator::new(kind)),
            SessionConfig::default(),
        ))
    }

    #[tokio::test]
    async fn published_payload_reaches_both_transports() {
        let producer = ScenarioProducer::new();
        let sse = registry(TransportKind::Sse);
        let ws = registry(TransportKind::WebSocket);
        bridge(&producer, &[sse.clone(), ws.clone()]);

        let sse_mock = MockTransport::new(TransportKind::Sse);
        let ws_mock = MockTransport::new(TransportKind::WebSocket);
        let _a = sse.add_session(Box::new(sse_mock.clone()));
        let _b = ws.add_session(Box::new(ws_mock.clone()));

        producer.publish_data(json!({"scenario": "manual", "data": [1, 2, 3]}));

        for mock in [&sse_mock, &ws_mock] {
            let data = mock.frames_of(&EventType::Data);
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].envelope.data["scenario"], "manual");
        }
        assert_eq!(sse.metrics().snapshot().total_messages, 1);
        assert_eq!(ws.metrics().snapshot().total_messages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn simulation_metrics_are_control_frames() {
        let producer = ScenarioProducer::new();
        let ws = registry(TransportKind::WebSocket);
        bridge(&producer, &[ws.clone()]);
        let mock = MockTransport::new(TransportKind::WebSocket);
        let _s = ws.add_session(Box::new(mock.clone()));

        let _ = producer
            .start_simulation("websocket", "high-frequency", Duration::from_millis(1_050))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(mock.frames_of(&EventType::Data).len(), 10);
        assert_eq!(mock.frames_of(&EventType::Metrics).len(), 1);
        assert_eq!(ws.metrics().snapshot().total_messages, 10);
    }
}
