//! # pushbench-core
//!
//! Shared vocabulary for the push comparison harness:
//!
//! - **Branded IDs**: `ConnectionId`, `SimulationId`
//! - **Wire envelope**: `Envelope`, `Frame`, `EventType` and SSE framing
//! - **Transport contract**: the `Transport` trait both adapters implement
//! - **Errors**: `SendError`, `TransportError`

#![deny(unsafe_code)]

pub mod clock;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod transport;

pub use envelope::{Envelope, EventType, Frame};
pub use errors::SendError;
pub use ids::{ConnectionId, SimulationId};
pub use transport::{Transport, TransportError, TransportKind};
