//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Live sessions per transport.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConnectionCounts {
    pub sse: usize,
    pub websocket: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the server answers.
    pub status: &'static str,
    pub uptime_secs: u64,
    /// RFC 3339 wall-clock time of the check.
    pub timestamp: String,
    pub connections: ConnectionCounts,
}

/// Build the health body from the server start time and live counts.
pub fn health_check(start_time: Instant, connections: ConnectionCounts) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        uptime_secs: start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        connections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_counts_and_uptime() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, ConnectionCounts { sse: 2, websocket: 5 });
        assert_eq!(resp.status, "healthy");
        assert!(resp.uptime_secs >= 59);
        assert_eq!(resp.connections.sse, 2);
        assert_eq!(resp.connections.websocket, 5);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), ConnectionCounts { sse: 0, websocket: 1 });
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["status"], "healthy");
        assert_eq!(parsed["connections"]["websocket"], 1);
        assert!(parsed["uptime_secs"].is_u64());
        assert!(chrono::DateTime::parse_from_rfc3339(parsed["timestamp"].as_str().unwrap()).is_ok());
    }
}
