//! Socket abstraction used by the sync modules.
//!
//! Two patterns are needed: publish/subscribe for the update stream, and strict
//! request/reply for the scene transfer. Both the in-process
//! [`loopback`] transport and the [`tcp`] transport hand out the same socket
//! types, so the modules never know which one they run on.

pub mod codec;
pub mod loopback;
pub mod tcp;

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("transport closed")]
    Closed,

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Sending half of a pub/sub channel. Publishing never blocks.
pub trait FramePublisher: Send + Sync {
    fn publish(&self, frame: Bytes) -> TransportResult<()>;
}

/// Receiving half of a pub/sub channel, subscribed to every topic.
#[derive(Debug)]
pub struct SubscriberSocket {
    rx: mpsc::UnboundedReceiver<Bytes>,
    _guard: Option<DropGuard>,
}

impl SubscriberSocket {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Bytes>, cancel: Option<CancellationToken>) -> Self {
        Self {
            rx,
            _guard: cancel.map(CancellationToken::drop_guard),
        }
    }

    /// Next frame, or `None` once the transport is closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

/// A request as seen by the responder.
#[derive(Debug)]
pub struct IncomingRequest {
    topic: String,
    reply: oneshot::Sender<Bytes>,
}

impl IncomingRequest {
    pub(crate) fn new(topic: String) -> (Self, oneshot::Receiver<Bytes>) {
        let (reply, rx) = oneshot::channel();
        (Self { topic, reply }, rx)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Sends the single reply. Dropping the request without replying fails
    /// the requester with [`TransportError::Closed`].
    pub fn reply(self, body: Bytes) {
        if self.reply.send(body).is_err() {
            debug!(topic = %self.topic, "requester gone before reply");
        }
    }
}

/// Client side of the request/reply pattern.
///
/// `&mut self` on [`RequestSocket::request`] enforces strict alternation. After
/// a timeout the peer may still answer the abandoned request, so the socket
/// refuses further requests and has to be replaced.
#[derive(Debug)]
pub struct RequestSocket {
    tx: mpsc::Sender<IncomingRequest>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    poisoned: bool,
}

impl RequestSocket {
    pub(crate) fn new(
        tx: mpsc::Sender<IncomingRequest>,
        cancel: CancellationToken,
        worker: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            tx,
            cancel,
            worker,
            poisoned: false,
        }
    }

    pub async fn request(&mut self, topic: &str, timeout: Duration) -> TransportResult<Bytes> {
        if self.poisoned || self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let (request, reply) = IncomingRequest::new(topic.to_owned());
        self.tx
            .send(request)
            .await
            .map_err(|_| TransportError::Closed)?;

        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => {
                self.poisoned = true;
                Err(TransportError::Closed)
            }
            Err(_) => {
                self.poisoned = true;
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    /// Abandons any in-flight request and waits until the worker released the socket.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                debug!(%err, "request worker ended abnormally");
            }
        }
    }
}

/// Server side of the request/reply pattern.
#[derive(Debug)]
pub struct ResponderSocket {
    rx: mpsc::Receiver<IncomingRequest>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl ResponderSocket {
    pub(crate) fn new(
        rx: mpsc::Receiver<IncomingRequest>,
        cancel: CancellationToken,
        worker: Option<JoinHandle<()>>,
    ) -> Self {
        Self { rx, cancel, worker }
    }

    /// Next request, or `None` once every requester is gone or the socket was closed.
    pub async fn next_request(&mut self) -> Option<IncomingRequest> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            request = self.rx.recv() => request,
        }
    }

    pub async fn close(mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                debug!(%err, "responder worker ended abnormally");
            }
        }
    }
}
