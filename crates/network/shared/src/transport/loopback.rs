//! In-process transport.
//!
//! Keeps server and clients in one process without touching the network
//! stack; used for single-process runs and tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{
    FramePublisher, RequestSocket, ResponderSocket, SubscriberSocket, TransportError,
    TransportResult,
};

/// Pending requests a loopback responder buffers before requesters wait.
const REQUEST_QUEUE: usize = 8;

/// Pub/sub fan-out: every published frame reaches every live subscriber.
#[derive(Debug, Default)]
pub struct LoopbackHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Bytes>>>,
    closed: AtomicBool,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> SubscriberSocket {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.closed.load(Ordering::Acquire) {
            if let Ok(mut subscribers) = self.subscribers.lock() {
                subscribers.push(tx);
            }
        }
        SubscriberSocket::new(rx, None)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Disconnects every subscriber; their `recv` then returns `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }
}

impl FramePublisher for LoopbackHub {
    fn publish(&self, frame: Bytes) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| TransportError::Send("subscriber list poisoned".into()))?;
        subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
        trace!(len = frame.len(), subscribers = subscribers.len(), "frame published");
        Ok(())
    }
}

/// A connected request/reply pair.
pub fn request_pair() -> (RequestSocket, ResponderSocket) {
    let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
    let cancel = CancellationToken::new();
    (
        RequestSocket::new(tx, cancel.child_token(), None),
        ResponderSocket::new(rx, cancel, None),
    )
}
