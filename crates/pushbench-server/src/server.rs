//! `PushServer`: shared state, router and listener lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use pushbench_core::TransportKind;
use pushbench_engine::{bridge, ConnectionRegistry, ScenarioProducer};
use pushbench_telemetry::MetricsAggregator;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::handlers;
use crate::settings::Settings;
use crate::shutdown::ShutdownCoordinator;
use crate::sse;
use crate::websocket;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub sse: Arc<ConnectionRegistry>,
    pub websocket: Arc<ConnectionRegistry>,
    pub producer: ScenarioProducer,
    pub settings: Arc<Settings>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub start_time: Instant,
}

/// Owns both registries and the producer, wired together at construction.
pub struct PushServer {
    state: AppState,
}

impl PushServer {
    pub fn new(settings: Settings) -> Self {
        let session_config = settings.session_config();
        let registry = |kind| {
            Arc::new(ConnectionRegistry::new(
                kind,
                Arc::new(MetricsAggregator::new(kind)),
                session_config,
            ))
        };
        let sse = registry(TransportKind::Sse);
        let websocket = registry(TransportKind::WebSocket);
        let producer = ScenarioProducer::new();
        bridge(&producer, &[sse.clone(), websocket.clone()]);

        Self {
            state: AppState {
                sse,
                websocket,
                producer,
                settings: Arc::new(settings),
                shutdown: Arc::new(ShutdownCoordinator::new()),
                start_time: Instant::now(),
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn listen(self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.state.settings.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });

        info!(%addr, "listening");
        info!("sse endpoint: http://{addr}/events");
        info!("websocket endpoint: ws://{addr}/websocket");
        Ok(ServerHandle {
            addr,
            task,
            state: self.state,
        })
    }
}

/// Build the router over explicitly constructed state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(sse::events_handler))
        .route("/websocket", get(websocket::websocket_handler))
        .route("/api/sse/connections", get(handlers::sse_connections))
        .route("/api/sse/broadcast", post(handlers::sse_broadcast))
        .route("/api/websocket/connections", get(handlers::websocket_connections))
        .route("/api/websocket/broadcast", post(handlers::websocket_broadcast))
        .route("/api/stats", get(handlers::stats))
        .route("/api/simulate/{type}", post(handlers::simulate))
        .route("/api/stop-simulation", post(handlers::stop_simulation))
        .route("/api/simulations", get(handlers::simulations))
        .route("/api/reset", post(handlers::reset))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A running server.
pub struct ServerHandle {
    addr: SocketAddr,
    task: JoinHandle<()>,
    state: AppState,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop simulations, close every session, then drain the server task.
    pub async fn shutdown(self) {
        info!("shutting down");
        self.state.producer.stop_all();
        self.state.sse.close_all();
        self.state.websocket.close_all();
        self.state.shutdown.drain(vec![self.task], None).await;
        info!("shutdown complete");
    }
}
