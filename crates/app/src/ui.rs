use std::sync::Mutex;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::trace;

/// Notifications for whatever view layer hosts the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// All six blobs arrived and the scene is current.
    SceneReceived { objects: usize },
    /// A scene transfer or decode failed; the previous scene is still loaded.
    SceneLoadFailed(String),
    ObjectLockChanged { object_id: u16, locked: bool },
    HistoryChanged { len: usize, cursor: usize },
}

/// Model-to-view channel. Sending never blocks; events are dropped once the
/// receiver is gone.
#[derive(Debug)]
pub struct UiBridge {
    tx: UnboundedSender<UiEvent>,
    rx: Mutex<Option<UnboundedReceiver<UiEvent>>>,
}

impl Default for UiBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl UiBridge {
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn emit(&self, event: UiEvent) {
        if let Err(err) = self.tx.send(event) {
            trace!(event = ?err.0, "ui receiver gone, event dropped");
        }
    }

    /// Hands out the receiving end. Only the first caller gets it.
    pub fn take_receiver(&self) -> Option<UnboundedReceiver<UiEvent>> {
        match self.rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order_for_the_single_receiver() {
        let bridge = UiBridge::new();
        let mut rx = bridge.take_receiver().unwrap();
        assert!(bridge.take_receiver().is_none());

        bridge.emit(UiEvent::ObjectLockChanged {
            object_id: 3,
            locked: true,
        });
        bridge.emit(UiEvent::SceneLoadFailed("truncated".into()));

        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::ObjectLockChanged {
                object_id: 3,
                locked: true
            }
        );
        assert!(matches!(rx.try_recv(), Ok(UiEvent::SceneLoadFailed(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emitting_without_receiver_is_harmless() {
        let bridge = UiBridge::new();
        drop(bridge.take_receiver());
        bridge.emit(UiEvent::HistoryChanged { len: 0, cursor: 0 });
    }
}
