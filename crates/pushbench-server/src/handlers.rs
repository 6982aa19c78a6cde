//! REST control API.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pushbench_engine::{BroadcastResult, ConnectionRegistry, ScenarioError};
use pushbench_telemetry::compare;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::health::{self, ConnectionCounts, HealthResponse};
use crate::server::AppState;

/// Errors surfaced to API clients as `{success: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Scenario(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}

fn default_event_type() -> String {
    "message".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

fn default_duration_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    #[serde(default)]
    pub scenario: String,
    /// Seconds.
    #[serde(default = "default_duration_secs")]
    pub duration: u64,
}

fn connections(registry: &ConnectionRegistry) -> Json<Value> {
    let stats = registry.stats();
    Json(json!({ "count": stats.len(), "connections": stats }))
}

/// GET /api/sse/connections
pub async fn sse_connections(State(state): State<AppState>) -> Json<Value> {
    connections(&state.sse)
}

/// GET /api/websocket/connections
pub async fn websocket_connections(State(state): State<AppState>) -> Json<Value> {
    connections(&state.websocket)
}

fn broadcast(registry: &Arc<ConnectionRegistry>, request: BroadcastRequest) -> Json<BroadcastResult> {
    Json(registry.broadcast(request.event_type, &request.data))
}

/// POST /api/sse/broadcast
pub async fn sse_broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Json<BroadcastResult> {
    broadcast(&state.sse, request)
}

/// POST /api/websocket/broadcast
pub async fn websocket_broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Json<BroadcastResult> {
    broadcast(&state.websocket, request)
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let sse = state.sse.metrics().snapshot();
    let websocket = state.websocket.metrics().snapshot();
    let comparison = compare(&sse, &websocket);
    Json(json!({
        "sse": sse,
        "websocket": websocket,
        "comparison": comparison,
        "system": {
            "uptime": state.start_time.elapsed().as_secs(),
            "version": env!("CARGO_PKG_VERSION"),
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
    }))
}

/// POST /api/simulate/{type}
pub async fn simulate(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(request): Json<SimulateRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = state.producer.start_simulation(
        &kind,
        &request.scenario,
        Duration::from_secs(request.duration),
    )?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Started {} simulation for {} seconds", request.scenario, request.duration),
        "type": kind,
        "scenario": request.scenario,
        "simulationId": id,
    })))
}

/// POST /api/stop-simulation
pub async fn stop_simulation(State(state): State<AppState>) -> Json<Value> {
    state.producer.stop_all();
    Json(json!({ "success": true, "message": "All simulations stopped" }))
}

/// GET /api/simulations
pub async fn simulations(State(state): State<AppState>) -> Json<Value> {
    let active = state.producer.active_simulations();
    Json(json!({ "count": active.len(), "simulations": active }))
}

/// POST /api/reset
pub async fn reset(State(state): State<AppState>) -> Json<Value> {
    state.sse.metrics().reset_counters();
    state.websocket.metrics().reset_counters();
    info!("performance counters reset via api");
    Json(json!({ "success": true, "message": "Performance counters reset" }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = ConnectionCounts {
        sse: state.sse.active_count(),
        websocket: state.websocket.active_count(),
    };
    Json(health::health_check(state.start_time, counts))
}
