//! # pushbench-engine
//!
//! Transport-agnostic connection handling shared by the SSE and WebSocket
//! endpoints:
//!
//! - [`RateLimiter`]: per-session token bucket
//! - [`Session`]: one client connection with heartbeat, sequencing and quality counters
//! - [`ConnectionRegistry`]: live sessions of one transport, with lazy pruning and fan-out
//! - [`ScenarioProducer`]: synthetic data source feeding the registries through [`bridge`]

#![deny(unsafe_code)]

pub mod bridge;
pub mod channel;
pub mod limiter;
pub mod mock;
pub mod registry;
pub mod scenario;
pub mod session;

pub use bridge::bridge;
pub use channel::ChannelSink;
pub use limiter::{RateLimitPolicy, RateLimiter};
pub use registry::{BroadcastResult, ConnectionRegistry};
pub use scenario::{Scenario, ScenarioError, ScenarioProducer, SimulationInfo};
pub use session::{QualityStats, Session, SessionConfig, SessionPhase, SessionStats};
