//! TCP endpoints with `u32` length-prefixed frames.
//!
//! The server binds three ports: a fan-out for the update stream, a collector
//! that gathers client updates, and a responder for scene requests. Clients
//! connect a subscriber, a publisher and a requester to them.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::codec::{recv_frame_bytes, send_frame_bytes};
use super::{
    FramePublisher, IncomingRequest, RequestSocket, ResponderSocket, SubscriberSocket,
    TransportError, TransportResult,
};

const REQUEST_QUEUE: usize = 8;

/// Frames replayed to a fan-out peer right after it connected.
pub type SnapshotFn = Arc<dyn Fn() -> Vec<Bytes> + Send + Sync>;

async fn connect(endpoint: &str) -> TransportResult<TcpStream> {
    let stream = TcpStream::connect(endpoint)
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_owned(),
            source,
        })?;
    if let Err(err) = stream.set_nodelay(true) {
        debug!(%err, "TCP_NODELAY not set");
    }
    Ok(stream)
}

async fn bind(addr: &str) -> TransportResult<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: addr.to_owned(),
            source,
        })?;
    let local = listener
        .local_addr()
        .map_err(|source| TransportError::Connect {
            endpoint: addr.to_owned(),
            source,
        })?;
    Ok((listener, local))
}

async fn read_frames<R>(
    mut reader: R,
    tx: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
    max_frame_size: usize,
    peer: SocketAddr,
) where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = recv_frame_bytes(&mut reader, max_frame_size) => match frame {
                Ok(frame) => {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(%peer, error = %format!("{err:#}"), "update stream disconnected");
                    break;
                }
            }
        }
    }
}

async fn write_frames<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    cancel: CancellationToken,
    peer: SocketAddr,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(err) = send_frame_bytes(&mut writer, &frame).await {
                        warn!(%peer, error = %format!("{err:#}"), "update stream disconnected");
                        break;
                    }
                }
                None => break,
            }
        }
    }
}

/// Subscribes to a fan-out endpoint.
pub async fn connect_subscriber(
    endpoint: &str,
    max_frame_size: usize,
) -> TransportResult<SubscriberSocket> {
    let stream = connect(endpoint).await?;
    let peer = stream.peer_addr().map_err(|source| TransportError::Connect {
        endpoint: endpoint.to_owned(),
        source,
    })?;
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    tokio::spawn(read_frames(stream, tx, cancel.clone(), max_frame_size, peer));
    debug!(%peer, "subscriber connected");
    Ok(SubscriberSocket::new(rx, Some(cancel)))
}

/// Publishes into a collector endpoint.
#[derive(Debug)]
pub struct TcpPublisher {
    tx: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TcpPublisher {
    pub async fn connect(endpoint: &str) -> TransportResult<Self> {
        let stream = connect(endpoint).await?;
        let peer = stream.peer_addr().map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_owned(),
            source,
        })?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(write_frames(stream, rx, cancel.clone(), peer));
        debug!(%peer, "publisher connected");
        Ok(Self {
            tx,
            cancel,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub async fn close(&self) {
        self.cancel.cancel();
        let worker = self.worker.lock().ok().and_then(|mut slot| slot.take());
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                debug!(%err, "publisher worker ended abnormally");
            }
        }
    }
}

impl FramePublisher for TcpPublisher {
    fn publish(&self, frame: Bytes) -> TransportResult<()> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

/// Server side of the update stream: every frame goes to every connected peer.
pub struct TcpFanout {
    local_addr: SocketAddr,
    peers: Arc<Mutex<Vec<mpsc::UnboundedSender<Bytes>>>>,
    cancel: CancellationToken,
    accept: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TcpFanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpFanout")
            .field("local_addr", &self.local_addr)
            .field("peers", &self.peer_count())
            .finish()
    }
}

impl TcpFanout {
    /// Binds the fan-out. `snapshot` frames are queued to each new peer before
    /// any live frame, under the same lock that publishing takes.
    pub async fn bind(addr: &str, snapshot: Option<SnapshotFn>) -> TransportResult<Self> {
        let (listener, local_addr) = bind(addr).await?;
        let peers: Arc<Mutex<Vec<mpsc::UnboundedSender<Bytes>>>> = Arc::default();
        let cancel = CancellationToken::new();

        let accept = tokio::spawn({
            let peers = Arc::clone(&peers);
            let cancel = cancel.clone();
            async move {
                loop {
                    let (stream, peer) = tokio::select! {
                        _ = cancel.cancelled() => break,
                        accepted = listener.accept() => match accepted {
                            Ok(accepted) => accepted,
                            Err(err) => {
                                warn!(%err, "accept failed");
                                continue;
                            }
                        }
                    };
                    if let Err(err) = stream.set_nodelay(true) {
                        debug!(%err, "TCP_NODELAY not set");
                    }

                    let (tx, rx) = mpsc::unbounded_channel();
                    if let Ok(mut peers) = peers.lock() {
                        if let Some(snapshot) = &snapshot {
                            let frames = snapshot();
                            trace!(%peer, frames = frames.len(), "replaying state");
                            for frame in frames {
                                let _ = tx.send(frame);
                            }
                        }
                        peers.push(tx);
                    }
                    info!(%peer, "update subscriber connected");
                    tokio::spawn(write_frames(stream, rx, cancel.child_token(), peer));
                }
            }
        });

        Ok(Self {
            local_addr,
            peers,
            cancel,
            accept: Mutex::new(Some(accept)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub async fn close(&self) {
        self.cancel.cancel();
        let accept = self.accept.lock().ok().and_then(|mut slot| slot.take());
        if let Some(accept) = accept {
            if let Err(err) = accept.await {
                debug!(%err, "fan-out accept loop ended abnormally");
            }
        }
        if let Ok(mut peers) = self.peers.lock() {
            peers.clear();
        }
    }
}

impl FramePublisher for TcpFanout {
    fn publish(&self, frame: Bytes) -> TransportResult<()> {
        let mut peers = self
            .peers
            .lock()
            .map_err(|_| TransportError::Send("peer list poisoned".into()))?;
        peers.retain(|tx| tx.send(frame.clone()).is_ok());
        Ok(())
    }
}

/// Server side of the client update stream: frames of all peers merged into one socket.
pub async fn bind_collector(
    addr: &str,
    max_frame_size: usize,
) -> TransportResult<(SubscriberSocket, SocketAddr)> {
    let (listener, local_addr) = bind(addr).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            info!(%peer, "update publisher connected");
                            tokio::spawn(read_frames(
                                stream,
                                tx.clone(),
                                cancel.child_token(),
                                max_frame_size,
                                peer,
                            ));
                        }
                        Err(err) => warn!(%err, "accept failed"),
                    }
                }
            }
        }
    });

    Ok((SubscriberSocket::new(rx, Some(cancel)), local_addr))
}

/// Connects a requester. One request is on the wire at a time.
pub async fn connect_requester(
    endpoint: &str,
    max_frame_size: usize,
) -> TransportResult<RequestSocket> {
    let mut stream = connect(endpoint).await?;
    let (tx, mut rx) = mpsc::channel::<IncomingRequest>(1);
    let cancel = CancellationToken::new();

    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                let request = tokio::select! {
                    _ = cancel.cancelled() => break,
                    request = rx.recv() => match request {
                        Some(request) => request,
                        None => break,
                    }
                };
                if let Err(err) = send_frame_bytes(&mut stream, request.topic.as_bytes()).await {
                    warn!(error = %format!("{err:#}"), "scene request failed");
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    reply = recv_frame_bytes(&mut stream, max_frame_size) => match reply {
                        Ok(body) => request.reply(body),
                        Err(err) => {
                            warn!(error = %format!("{err:#}"), "scene responder disconnected");
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(RequestSocket::new(tx, cancel, Some(worker)))
}

/// Binds a responder. Each connection is served strictly in request/reply order.
pub async fn bind_responder(
    addr: &str,
    max_frame_size: usize,
) -> TransportResult<(ResponderSocket, SocketAddr)> {
    let (listener, local_addr) = bind(addr).await?;
    let (tx, rx) = mpsc::channel::<IncomingRequest>(REQUEST_QUEUE);
    let cancel = CancellationToken::new();

    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "requester connected");
                            tokio::spawn(serve_requests(
                                stream,
                                peer,
                                tx.clone(),
                                cancel.child_token(),
                                max_frame_size,
                            ));
                        }
                        Err(err) => warn!(%err, "accept failed"),
                    }
                }
            }
        }
    });

    Ok((ResponderSocket::new(rx, cancel, Some(worker)), local_addr))
}

async fn serve_requests(
    mut stream: TcpStream,
    peer: SocketAddr,
    tx: mpsc::Sender<IncomingRequest>,
    cancel: CancellationToken,
    max_frame_size: usize,
) {
    loop {
        let topic = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = recv_frame_bytes(&mut stream, max_frame_size) => match frame {
                Ok(frame) => String::from_utf8_lossy(&frame).into_owned(),
                Err(_) => {
                    debug!(%peer, "requester disconnected");
                    break;
                }
            }
        };

        let (request, reply) = IncomingRequest::new(topic);
        if tx.send(request).await.is_err() {
            break;
        }
        let body = tokio::select! {
            _ = cancel.cancelled() => break,
            body = reply => match body {
                Ok(body) => body,
                Err(_) => {
                    debug!(%peer, "request dropped without reply");
                    break;
                }
            }
        };
        if let Err(err) = send_frame_bytes(&mut stream, &body).await {
            warn!(%peer, error = %format!("{err:#}"), "reply failed");
            break;
        }
    }
}
