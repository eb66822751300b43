//! Forwarding of client frames to every subscriber.
//!
//! The relay remembers the latest state of every object so that late joiners
//! and RESENDUPDATE requests can be served without asking the clients.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use app::{Core, SyncClock};
use bytes::{Bytes, BytesMut};
use network_shared::transport::tcp::SnapshotFn;
use network_shared::{Frame, FramePublisher, Message, SubscriberSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct CacheInner {
    updates: BTreeMap<(u16, u16), Bytes>,
    locks: BTreeMap<u16, Bytes>,
}

/// Last PARAMETERUPDATE per parameter and current LOCK per object.
#[derive(Debug, Default)]
pub struct ObjectStateCache {
    inner: Mutex<CacheInner>,
}

impl ObjectStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records what `frame` changes. RESETOBJECT forgets the object.
    pub fn observe(&self, frame: &Frame<'_>, raw: &Bytes) {
        let mut inner = self.inner();
        match frame.message {
            Message::ParameterUpdate {
                object_id,
                parameter_id,
                ..
            } => {
                inner.updates.insert((object_id, parameter_id), raw.clone());
            }
            Message::Lock {
                object_id,
                locked: true,
            } => {
                inner.locks.insert(object_id, raw.clone());
            }
            Message::Lock {
                object_id,
                locked: false,
            } => {
                inner.locks.remove(&object_id);
            }
            Message::ResetObject { object_id } => {
                inner.locks.remove(&object_id);
                inner.updates.retain(|(object, _), _| *object != object_id);
            }
            _ => {}
        }
    }

    /// Cached frames, locks first, each restamped with `tick` so receivers
    /// apply them one lookback from now.
    pub fn snapshot(&self, tick: u8) -> Vec<Bytes> {
        let inner = self.inner();
        inner
            .locks
            .values()
            .chain(inner.updates.values())
            .map(|frame| restamp(frame, tick))
            .collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner();
        inner.locks.len() + inner.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner();
        inner.locks.clear();
        inner.updates.clear();
    }

    /// Replay source for a fan-out, stamped with the clock's current tick.
    pub fn snapshot_fn(self: &Arc<Self>, clock: Arc<SyncClock>) -> SnapshotFn {
        let cache = Arc::clone(self);
        Arc::new(move || cache.snapshot(clock.now()))
    }

    fn inner(&self) -> MutexGuard<'_, CacheInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn restamp(frame: &Bytes, tick: u8) -> Bytes {
    let mut copy = BytesMut::from(&frame[..]);
    if copy.len() > 1 {
        copy[1] = tick;
    }
    copy.freeze()
}

/// Fans client frames out to all subscribers, the sender included.
pub struct UpdateRelay {
    core: Core,
    cache: Arc<ObjectStateCache>,
    publisher: Arc<dyn FramePublisher>,
}

impl std::fmt::Debug for UpdateRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRelay")
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl UpdateRelay {
    pub fn new(core: Core, cache: Arc<ObjectStateCache>, publisher: Arc<dyn FramePublisher>) -> Self {
        Self {
            core,
            cache,
            publisher,
        }
    }

    pub fn cache(&self) -> &Arc<ObjectStateCache> {
        &self.cache
    }

    /// Handles one collected frame. Returns whether it was forwarded.
    pub fn relay(&self, raw: Bytes) -> bool {
        let frame = match Frame::decode(&raw) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, len = raw.len(), "not relaying frame");
                return false;
            }
        };
        match frame.message {
            Message::Sync { .. } => {
                trace!(sender = frame.sender, "client SYNC ignored, server owns the clock");
                false
            }
            Message::ResendUpdate => {
                let snapshot = self.cache.snapshot(self.core.clock().now());
                debug!(sender = frame.sender, frames = snapshot.len(), "resending object state");
                for cached in snapshot {
                    self.forward(cached);
                }
                false
            }
            _ => {
                self.cache.observe(&frame, &raw);
                self.forward(raw.clone());
                true
            }
        }
    }

    pub async fn run(&self, mut socket: SubscriberSocket, cancel: CancellationToken) {
        info!("update relay running");
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = socket.recv() => frame,
            };
            match frame {
                Some(frame) => {
                    self.relay(frame);
                }
                None => {
                    warn!("collector closed");
                    break;
                }
            }
        }
        info!(cached = self.cache.len(), "update relay stopped");
    }

    fn forward(&self, frame: Bytes) {
        if let Err(err) = self.publisher.publish(frame) {
            warn!(%err, "relay publish failed");
        }
    }
}
