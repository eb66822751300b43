//! Receives the update stream and applies it on tick boundaries.
//!
//! Control messages (SYNC, LOCK, UNDOREDOADD, RESETOBJECT) act as soon as they
//! arrive. Parameter updates are parked in the [`MessageBuffer`] under the
//! tick their sender stamped them with and applied by [`UpdateReceiver::consume`]
//! a fixed lookback later, so every client applies them in the same order.

use app::{Core, UiEvent};
use bytes::Bytes;
use network_shared::transport::tcp::connect_subscriber;
use network_shared::{
    Frame, Message, SubscriberSocket, TransportResult, decode_parameter_update,
};
use scene::ChangeOrigin;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::ring_buffer::MessageBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Disconnected,
    Connecting,
    Listening,
    Stopping,
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Acted on immediately.
    Applied,
    /// Parked until its tick is due.
    Buffered,
    /// Own echo, malformed, unknown target or without a handler.
    Dropped,
}

#[derive(Debug)]
pub struct UpdateReceiver {
    core: Core,
    buffer: MessageBuffer,
    state: watch::Sender<ModuleState>,
}

impl UpdateReceiver {
    pub fn new(core: Core) -> Self {
        let buffer = MessageBuffer::new(core.clock().timesteps());
        let (state, _) = watch::channel(ModuleState::Disconnected);
        Self {
            core,
            buffer,
            state,
        }
    }

    pub fn state(&self) -> ModuleState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ModuleState> {
        self.state.subscribe()
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    /// Subscribes to the server's update endpoint.
    pub async fn connect(&self) -> TransportResult<SubscriberSocket> {
        let network = &self.core.settings().network;
        let endpoint = network.update_endpoint();
        self.state.send_replace(ModuleState::Connecting);
        match connect_subscriber(&endpoint, network.max_frame_bytes).await {
            Ok(socket) => {
                info!(%endpoint, "update receiver connected");
                Ok(socket)
            }
            Err(err) => {
                self.state.send_replace(ModuleState::Disconnected);
                Err(err)
            }
        }
    }

    /// Receive loop. Returns once `cancel` fires or the stream ends; the
    /// socket is released before the state goes back to `Disconnected`.
    pub async fn listen(&self, mut socket: SubscriberSocket, cancel: CancellationToken) {
        let timeout = self.core.settings().network.receive_timeout();
        self.state.send_replace(ModuleState::Listening);
        info!(client_id = self.core.network().client_id, "update receiver listening");

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = tokio::time::timeout(timeout, socket.recv()) => received,
            };
            match received {
                Err(_) => trace!("no update within receive timeout"),
                Ok(Some(frame)) => {
                    self.dispatch(frame);
                }
                Ok(None) => {
                    warn!("update stream closed by server");
                    break;
                }
            }
        }

        self.state.send_replace(ModuleState::Stopping);
        drop(socket);
        self.state.send_replace(ModuleState::Disconnected);
        info!("update receiver stopped");
    }

    /// Routes one inbound frame. Never fails; bad frames are dropped.
    pub fn dispatch(&self, raw: Bytes) -> Dispatch {
        let identity = self.core.network();
        let frame = match Frame::decode(&raw) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, len = raw.len(), "dropping frame");
                return Dispatch::Dropped;
            }
        };
        if frame.sender == identity.client_id {
            trace!(kind = frame.message.kind().label(), "dropping own frame");
            return Dispatch::Dropped;
        }

        match frame.message {
            Message::Sync { tick } => {
                if identity.is_server {
                    trace!(sender = frame.sender, "server keeps its own clock");
                    return Dispatch::Dropped;
                }
                self.core.clock().set(tick);
                trace!(tick, "clock synchronised");
                Dispatch::Applied
            }
            Message::Lock { object_id, locked } => {
                let Some(object) = self.core.scene().object(object_id) else {
                    debug!(object_id, "lock for unknown object");
                    return Dispatch::Dropped;
                };
                object.set_locked(locked);
                self.core
                    .ui()
                    .emit(UiEvent::ObjectLockChanged { object_id, locked });
                Dispatch::Applied
            }
            Message::UndoRedoAdd {
                object_id,
                parameter_id,
            } => {
                let scene = self.core.scene();
                let Some(value) = scene
                    .registry()
                    .and_then(|registry| Some(registry.parameter(object_id, parameter_id)?.value()))
                else {
                    debug!(object_id, parameter_id, "history step for unknown parameter");
                    return Dispatch::Dropped;
                };
                scene.history().add_step(object_id, parameter_id, value);
                self.history_changed();
                Dispatch::Applied
            }
            Message::ResetObject { object_id } => {
                let scene = self.core.scene();
                let Some(object) = scene.object(object_id) else {
                    debug!(object_id, "reset for unknown object");
                    return Dispatch::Dropped;
                };
                object.reset_all(ChangeOrigin::Network);
                scene.history().vanish_object(object_id);
                self.history_changed();
                Dispatch::Applied
            }
            Message::ParameterUpdate { .. } => {
                let bucket = self.buffer.push(frame.tick, raw.clone());
                trace!(tick = frame.tick, bucket, "update buffered");
                Dispatch::Buffered
            }
            other @ (Message::Ping | Message::ResendUpdate | Message::DataHub) => {
                trace!(kind = other.kind().label(), sender = frame.sender, "no handler");
                Dispatch::Dropped
            }
        }
    }

    /// Applies the bucket due at the current tick. Returns the number of
    /// parameters updated.
    pub fn consume(&self) -> usize {
        self.consume_bucket(self.core.clock().due_bucket())
    }

    pub fn consume_bucket(&self, bucket: usize) -> usize {
        let frames = self.buffer.drain(bucket);
        if frames.is_empty() {
            return 0;
        }
        let Some(registry) = self.core.scene().registry() else {
            debug!(bucket, dropped = frames.len(), "updates without a loaded scene");
            return 0;
        };

        let mut applied = 0;
        for raw in &frames {
            let (object_id, parameter_id, value) = match decode_parameter_update(raw) {
                Ok(address) => address,
                Err(err) => {
                    debug!(%err, "dropping buffered frame");
                    continue;
                }
            };
            let Some(parameter) = registry.parameter(object_id, parameter_id) else {
                debug!(object_id, parameter_id, "update for unknown parameter");
                continue;
            };
            match parameter.deserialize(value) {
                Ok(()) => applied += 1,
                Err(err) => debug!(object_id, parameter_id, %err, "update rejected"),
            }
        }
        trace!(bucket, applied, "bucket consumed");
        applied
    }

    fn history_changed(&self) {
        let history = self.core.scene().history();
        self.core.ui().emit(UiEvent::HistoryChanged {
            len: history.len(),
            cursor: history.cursor(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app::NetworkIdentity;
    use network_shared::encode_parameter_update;
    use scene::{NodeKind, ParameterValue, SceneData, SceneNode, Transform};
    use settings::SyncSettings;

    fn core(client_id: u8, is_server: bool) -> Core {
        let mut settings = SyncSettings::default();
        settings.clock.frame_rate = 24;
        Core::new(settings, NetworkIdentity { client_id, is_server })
    }

    fn load_single_editable(core: &Core) {
        let node = |name: &str, editable, child_count| SceneNode {
            name: name.into(),
            editable,
            child_count,
            transform: Transform::default(),
            kind: NodeKind::Group,
        };
        let data = SceneData {
            nodes: vec![node("root", false, 1), node("cube", true, 0)],
            ..SceneData::default()
        };
        core.scene().load_data(data).unwrap();
    }

    #[test]
    fn sync_sets_clock_but_not_on_servers() {
        let client = UpdateReceiver::new(core(3, false));
        let frame = Frame::new(254, 0, Message::Sync { tick: 255 }).encode();
        assert_eq!(client.dispatch(frame.clone()), Dispatch::Applied);
        assert_eq!(client.core.clock().now(), 15);

        let server = UpdateReceiver::new(core(254, true));
        let from_client = Frame::new(3, 0, Message::Sync { tick: 9 }).encode();
        assert_eq!(server.dispatch(from_client), Dispatch::Dropped);
        assert_eq!(server.core.clock().now(), 0);
    }

    #[test]
    fn buffered_updates_wait_for_their_bucket() {
        let core = core(3, false);
        load_single_editable(&core);
        let receiver = UpdateReceiver::new(core.clone());
        let value = ParameterValue::Vector3([1.0, 2.0, 3.0]);
        let frame = encode_parameter_update(9, 5, 1, 0, &value);

        assert_eq!(receiver.dispatch(frame), Dispatch::Buffered);
        assert_eq!(receiver.consume_bucket(4), 0);
        assert_eq!(receiver.consume_bucket(5), 1);
        assert_eq!(receiver.consume_bucket(5), 0);
        assert_eq!(
            core.scene().registry().unwrap().parameter(1, 0).unwrap().value(),
            value
        );
    }

    #[test]
    fn malformed_and_unhandled_frames_are_dropped() {
        let receiver = UpdateReceiver::new(core(3, false));
        assert_eq!(receiver.dispatch(Bytes::from_static(&[1, 0])), Dispatch::Dropped);
        assert_eq!(receiver.dispatch(Bytes::from_static(&[1, 0, 42])), Dispatch::Dropped);
        assert_eq!(receiver.dispatch(Bytes::from_static(&[1, 0, 1, 0])), Dispatch::Dropped);
        assert_eq!(
            receiver.dispatch(Frame::new(1, 0, Message::Ping).encode()),
            Dispatch::Dropped
        );
        assert_eq!(receiver.buffer().pending(), 0);
    }
}
