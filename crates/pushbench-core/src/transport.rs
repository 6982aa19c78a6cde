//! The contract a wire adapter fulfils for a session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::Frame;

/// Which push transport a session runs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    #[serde(rename = "sse")]
    Sse,
    #[serde(rename = "websocket")]
    WebSocket,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::WebSocket => "websocket",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by an adapter write.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone; the session cannot be used again.
    #[error("transport closed")]
    Closed,
    /// The writer queue is full; this frame was dropped.
    #[error("send queue full")]
    Backpressure,
}

impl TransportError {
    /// Whether the failure means the connection is dead.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Capability a session needs from its wire: write one frame, or hang up.
///
/// `write` must not block. Adapters hand the frame to a writer task and
/// report only whether it was accepted.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    fn write(&self, frame: &Frame) -> Result<(), TransportError>;

    /// Release the underlying connection. Called at most once by the session.
    fn close(&self);

    /// False once the peer is known to be gone, even if no close was observed.
    fn is_open(&self) -> bool {
        true
    }

    /// Queue a protocol-level liveness probe. Wires without one do nothing.
    fn ping(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
