//! # pushbench-server
//!
//! Axum server exposing the same data feed over Server-Sent Events and
//! WebSocket, plus the REST control API.
//!
//! - [`settings`]: layered configuration (defaults, JSON file, env vars)
//! - [`server`]: router, shared state, listener lifecycle
//! - [`sse`] / [`websocket`]: wire adapters implementing `Transport`
//! - [`handlers`]: connection listings, broadcasts, simulations, stats
//! - [`health`], [`shutdown`]

#![deny(unsafe_code)]

pub mod errors;
pub mod handlers;
pub mod health;
pub mod server;
pub mod settings;
pub mod shutdown;
pub mod sse;
pub mod websocket;

pub use errors::SettingsError;
pub use server::{AppState, PushServer, ServerHandle};
pub use settings::{load_settings_from_path, Settings};
pub use shutdown::ShutdownCoordinator;
