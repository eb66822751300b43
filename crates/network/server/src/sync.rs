use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use app::Core;
use network_shared::{Frame, FramePublisher, Message};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

/// Drives the master clock and periodically announces it to all clients.
pub struct SyncBroadcaster {
    core: Core,
    publisher: Arc<dyn FramePublisher>,
    elapsed: AtomicU32,
}

impl std::fmt::Debug for SyncBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBroadcaster")
            .field("elapsed", &self.elapsed.load(Ordering::Relaxed))
            .finish()
    }
}

impl SyncBroadcaster {
    pub fn new(core: Core, publisher: Arc<dyn FramePublisher>) -> Self {
        Self {
            core,
            publisher,
            elapsed: AtomicU32::new(0),
        }
    }

    /// Advances the clock by one tick and sends SYNC every
    /// `sync_interval_ticks`. Returns whether a SYNC went out.
    pub fn step(&self) -> bool {
        let tick = self.core.clock().advance();
        let interval = u32::from(self.core.settings().clock.effective_sync_interval().max(1));
        let elapsed = self.elapsed.fetch_add(1, Ordering::Relaxed) + 1;
        if elapsed % interval != 0 {
            return false;
        }
        let sender = self.core.network().client_id;
        let frame = Frame::new(sender, tick, Message::Sync { tick }).encode();
        match self.publisher.publish(frame) {
            Ok(()) => {
                trace!(tick, "sync broadcast");
                true
            }
            Err(err) => {
                warn!(%err, "sync broadcast failed");
                false
            }
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.core.clock().frame_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            frame_rate = self.core.clock().frame_rate(),
            every = self.core.settings().clock.effective_sync_interval(),
            "sync broadcaster running"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.step();
                }
            }
        }
        info!("sync broadcaster stopped");
    }
}
