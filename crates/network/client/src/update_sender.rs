use std::sync::{Arc, Mutex, Weak};

use app::Core;
use network_shared::{
    ClientId, Frame, FramePublisher, Message, TransportResult, encode_parameter_update,
};
use scene::{ChangeOrigin, Parameter, ParameterChange, SceneRegistry, SubscriptionId};
use tracing::{debug, trace, warn};

/// Publishes local edits and control messages to the server.
///
/// Parameter changes are picked up through observers on every parameter of
/// the current scene. Only changes with [`ChangeOrigin::Local`] on
/// distributed parameters go out; anything applied from the network stays
/// local so it cannot echo.
pub struct UpdateSender {
    core: Core,
    publisher: Arc<dyn FramePublisher>,
    subscriptions: Mutex<Vec<(Weak<Parameter>, SubscriptionId)>>,
}

impl std::fmt::Debug for UpdateSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSender")
            .field("client_id", &self.client_id())
            .field("observed", &self.observed())
            .finish()
    }
}

impl UpdateSender {
    pub fn new(core: Core, publisher: Arc<dyn FramePublisher>) -> Self {
        Self {
            core,
            publisher,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    fn client_id(&self) -> ClientId {
        self.core.network().client_id
    }

    /// Number of parameters currently observed.
    pub fn observed(&self) -> usize {
        self.subscriptions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Observes every parameter of `registry`, replacing earlier observers.
    pub fn attach(&self, registry: &SceneRegistry) {
        self.detach();
        let mut added = Vec::new();
        for object in registry.iter() {
            for parameter in object.parameters() {
                if !parameter.distribute() {
                    continue;
                }
                let id = parameter.subscribe(self.observer(Arc::downgrade(parameter)));
                added.push((Arc::downgrade(parameter), id));
            }
        }
        debug!(parameters = added.len(), "update sender attached");
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            *subscriptions = added;
        }
    }

    /// Drops every observer installed by [`UpdateSender::attach`].
    pub fn detach(&self) {
        let previous = match self.subscriptions.lock() {
            Ok(mut subscriptions) => std::mem::take(&mut *subscriptions),
            Err(_) => return,
        };
        for (parameter, id) in previous {
            if let Some(parameter) = parameter.upgrade() {
                parameter.unsubscribe(id);
            }
        }
    }

    fn observer(
        &self,
        parameter: Weak<Parameter>,
    ) -> impl Fn(&ParameterChange<'_>) + Send + Sync + 'static {
        let publisher = Arc::clone(&self.publisher);
        let clock = Arc::clone(self.core.clock());
        let sender = self.client_id();
        move |change: &ParameterChange<'_>| {
            if change.origin != ChangeOrigin::Local {
                return;
            }
            // Callbacks of a network-fired action must not go back out.
            if parameter.upgrade().is_some_and(|p| p.is_network_locked()) {
                return;
            }
            let frame = encode_parameter_update(
                sender,
                clock.now(),
                change.object_id,
                change.parameter_id,
                change.value,
            );
            match publisher.publish(frame) {
                Ok(()) => trace!(
                    object_id = change.object_id,
                    parameter_id = change.parameter_id,
                    "update published"
                ),
                Err(err) => warn!(object_id = change.object_id, %err, "update not published"),
            }
        }
    }

    pub fn send_lock(&self, object_id: u16, locked: bool) -> TransportResult<()> {
        self.publish(Message::Lock { object_id, locked })
    }

    pub fn send_undo_redo_add(&self, object_id: u16, parameter_id: u16) -> TransportResult<()> {
        self.publish(Message::UndoRedoAdd {
            object_id,
            parameter_id,
        })
    }

    pub fn send_reset_object(&self, object_id: u16) -> TransportResult<()> {
        self.publish(Message::ResetObject { object_id })
    }

    /// Announces the local tick.
    pub fn send_sync(&self) -> TransportResult<()> {
        self.publish(Message::Sync {
            tick: self.core.clock().now(),
        })
    }

    fn publish(&self, message: Message<'_>) -> TransportResult<()> {
        let kind = message.kind();
        let frame = Frame::new(self.client_id(), self.core.clock().now(), message).encode();
        self.publisher.publish(frame)?;
        trace!(kind = kind.label(), "control message published");
        Ok(())
    }
}

impl Drop for UpdateSender {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app::NetworkIdentity;
    use network_shared::MessageType;
    use network_shared::transport::loopback::LoopbackHub;
    use scene::{ParameterValue, SceneObject};
    use settings::SyncSettings;

    fn setup() -> (UpdateSender, Arc<LoopbackHub>, SceneRegistry) {
        let core = Core::new(
            SyncSettings::default(),
            NetworkIdentity {
                client_id: 12,
                is_server: false,
            },
        );
        core.clock().set(40);
        let hub = Arc::new(LoopbackHub::new());
        let sender = UpdateSender::new(core, hub.clone());
        let registry = SceneRegistry::from_objects(vec![
            SceneObject::builder(1, "slate")
                .parameter("take", ParameterValue::Int(1))
                .action("clap")
                .build(),
        ]);
        (sender, hub, registry)
    }

    #[test]
    fn publishes_local_changes_only() {
        let (sender, hub, registry) = setup();
        let mut rx = hub.subscribe();
        sender.attach(&registry);
        assert_eq!(sender.observed(), 2);

        let take = registry.parameter(1, 0).unwrap();
        take.set(ParameterValue::Int(2), ChangeOrigin::Local).unwrap();
        take.deserialize(&3i32.to_le_bytes()).unwrap();

        let frame = rx.try_recv().unwrap();
        assert_eq!(&frame[..3], &[12, 40, MessageType::ParameterUpdate as u8]);
        assert_eq!(&frame[7..], &2i32.to_le_bytes());
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn network_fired_action_does_not_echo() {
        let (sender, hub, registry) = setup();
        let mut rx = hub.subscribe();
        sender.attach(&registry);

        let clap = registry.parameter(1, 1).unwrap().clone();
        let echo = Arc::clone(&clap);
        clap.subscribe(move |change| {
            if change.origin == ChangeOrigin::Network {
                echo.invoke();
            }
        });
        clap.deserialize(&[]).unwrap();
        assert!(rx.try_recv().is_none());

        clap.invoke();
        assert_eq!(rx.try_recv().unwrap().len(), 7);
    }

    #[test]
    fn detach_stops_publishing() {
        let (sender, hub, registry) = setup();
        let mut rx = hub.subscribe();
        sender.attach(&registry);
        sender.detach();
        registry
            .parameter(1, 0)
            .unwrap()
            .set(ParameterValue::Int(9), ChangeOrigin::Local)
            .unwrap();
        assert!(rx.try_recv().is_none());
        assert_eq!(sender.observed(), 0);
    }

    #[test]
    fn control_messages_carry_id_and_tick() {
        let (sender, hub, _) = setup();
        let mut rx = hub.subscribe();
        sender.send_lock(4, true).unwrap();
        sender.send_undo_redo_add(4, 2).unwrap();
        sender.send_reset_object(4).unwrap();
        sender.send_sync().unwrap();

        let frames: Vec<_> = std::iter::from_fn(|| rx.try_recv()).collect();
        let decoded: Vec<_> = frames.iter().map(|f| Frame::decode(f).unwrap()).collect();
        assert!(decoded.iter().all(|f| f.sender == 12 && f.tick == 40));
        assert_eq!(
            decoded[0].message,
            Message::Lock {
                object_id: 4,
                locked: true
            }
        );
        assert_eq!(decoded[2].message, Message::ResetObject { object_id: 4 });
        assert_eq!(decoded[3].message, Message::Sync { tick: 40 });
    }
}
