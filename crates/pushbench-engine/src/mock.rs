//! In-memory transport for tests.
//!
//! Records every frame it accepts and can be switched into a failure mode to
//! exercise backpressure and dead-peer paths without a socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pushbench_core::{EventType, Frame, Transport, TransportError, TransportKind};

#[derive(Default)]
struct MockState {
    frames: Mutex<Vec<Frame>>,
    fail_with: Mutex<Option<TransportError>>,
    peer_gone: AtomicBool,
    close_calls: AtomicUsize,
    pings: AtomicUsize,
}

/// Cloneable handle; every clone observes the same recorded frames.
#[derive(Clone)]
pub struct MockTransport {
    kind: TransportKind,
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            state: Arc::new(MockState::default()),
        }
    }

    /// Make every subsequent write fail with `error`.
    pub fn fail_with(&self, error: TransportError) {
        *self.state.fail_with.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.state.fail_with.lock() = None;
    }

    /// Simulate a peer that vanished without the session hearing about it.
    pub fn drop_peer(&self) {
        self.state.peer_gone.store(true, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.state.frames.lock().clone()
    }

    pub fn frames_of(&self, event_type: &EventType) -> Vec<Frame> {
        self.state
            .frames
            .lock()
            .iter()
            .filter(|f| f.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub fn message_ids(&self) -> Vec<u64> {
        self.state.frames.lock().iter().map(Frame::message_id).collect()
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }

    /// Protocol pings accepted so far.
    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn write(&self, frame: &Frame) -> Result<(), TransportError> {
        if let Some(error) = self.state.fail_with.lock().clone() {
            return Err(error);
        }
        self.state.frames.lock().push(frame.clone());
        Ok(())
    }

    fn close(&self) {
        let _ = self.state.close_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        !self.state.peer_gone.load(Ordering::SeqCst)
    }

    fn ping(&self) -> Result<(), TransportError> {
        if let Some(error) = self.state.fail_with.lock().clone() {
            return Err(error);
        }
        let _ = self.state.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
