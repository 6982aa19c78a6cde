//! Non-blocking sender half used by the wire adapters.

use parking_lot::Mutex;
use pushbench_core::TransportError;
use tokio::sync::mpsc;

/// Wraps the sending side of a connection's writer queue.
///
/// `push` never waits: a full queue is reported as backpressure and a dropped
/// receiver as a closed transport. `close` drops the sender so the writer
/// task sees the end of its stream.
pub struct ChannelSink<T> {
    tx: Mutex<Option<mpsc::Sender<T>>>,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Create a sink with its receiver.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn push(&self, item: T) -> Result<(), TransportError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(TransportError::Closed);
        };
        match tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(TransportError::Backpressure),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    pub fn is_open(&self) -> bool {
        self.tx.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn close(&self) {
        let _ = self.tx.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::channel(8);
        for i in 0..3 {
            sink.push(i).unwrap();
        }
        assert_eq!(rx.recv().await, Some(0));
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[test]
    fn full_queue_is_backpressure() {
        let (sink, _rx) = ChannelSink::channel(1);
        sink.push("a").unwrap();
        assert_eq!(sink.push("b"), Err(TransportError::Backpressure));
        assert!(sink.is_open());
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (sink, rx) = ChannelSink::channel(4);
        drop(rx);
        assert!(!sink.is_open());
        assert_eq!(sink.push(1), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn close_ends_receiver() {
        let (sink, mut rx) = ChannelSink::<u8>::channel(4);
        sink.close();
        sink.close();
        assert!(!sink.is_open());
        assert_eq!(rx.recv().await, None);
        assert_eq!(sink.push(1), Err(TransportError::Closed));
    }
}
