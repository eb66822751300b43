use std::sync::Arc;

use app::{Core, UiEvent};
use network_shared::transport::tcp::TcpPublisher;
use network_shared::{
    FramePublisher, ModuleKind, ModuleTask, RequestSocket, SubscriberSocket, TransportError,
};
use scene::{HistoryStep, LoadedScene};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::scene_receiver::{SceneReceiver, SceneTransferError};
use crate::update_receiver::{ModuleState, UpdateReceiver};
use crate::update_sender::UpdateSender;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Scene(#[from] SceneTransferError),
}

/// A client's network modules around one shared [`Core`].
///
/// The host calls [`ClientSession::tick`] once per frame interval; everything
/// else runs on module tasks.
#[derive(Debug)]
pub struct ClientSession {
    core: Core,
    scene_receiver: SceneReceiver,
    receiver: Arc<UpdateReceiver>,
    sender: UpdateSender,
    cancel: CancellationToken,
    tasks: Vec<ModuleTask>,
}

impl ClientSession {
    pub fn new(core: Core, publisher: Arc<dyn FramePublisher>) -> Self {
        Self {
            scene_receiver: SceneReceiver::new(core.clone()),
            receiver: Arc::new(UpdateReceiver::new(core.clone())),
            sender: UpdateSender::new(core.clone(), publisher),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            core,
        }
    }

    /// Connects every module to the server named in the settings, loads its
    /// scene and starts receiving updates.
    pub async fn connect_tcp(core: Core) -> Result<Self, ClientError> {
        let endpoint = core.settings().network.collect_endpoint();
        let publisher = Arc::new(TcpPublisher::connect(&endpoint).await?);
        let mut session = Self::new(core, publisher);

        for kind in ModuleKind::CLIENT {
            match kind {
                ModuleKind::SceneReceiver => {
                    let socket = session.scene_receiver.connect().await?;
                    session.load_scene(socket).await?;
                }
                ModuleKind::UpdateReceiver => {
                    let socket = session.receiver.connect().await?;
                    session.start_updates(socket);
                }
                ModuleKind::UpdateSender => {
                    debug!(observed = session.sender.observed(), "update sender ready");
                }
                other => warn!(module = %other, "not a client module"),
            }
        }
        Ok(session)
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn receiver(&self) -> &UpdateReceiver {
        &self.receiver
    }

    pub fn sender(&self) -> &UpdateSender {
        &self.sender
    }

    pub fn receiver_state(&self) -> ModuleState {
        self.receiver.state()
    }

    /// Runs the scene transfer on `socket`. On success local edits of the new
    /// scene start being published; on failure the previous scene stays.
    pub async fn load_scene(&self, socket: RequestSocket) -> Result<Arc<LoadedScene>, SceneTransferError> {
        let scene = self.scene_receiver.receive(socket).await?;
        self.receiver.buffer().clear();
        self.sender.attach(&scene.registry);
        Ok(scene)
    }

    /// Spawns the receive loop on `socket`.
    pub fn start_updates(&mut self, socket: SubscriberSocket) {
        let receiver = Arc::clone(&self.receiver);
        self.tasks.push(ModuleTask::spawn(
            ModuleKind::UpdateReceiver,
            &self.cancel,
            move |cancel| async move { receiver.listen(socket, cancel).await },
        ));
    }

    /// One application time step: advance the clock, then apply the bucket
    /// that became due. Returns the number of applied updates.
    pub fn tick(&self) -> usize {
        let tick = self.core.clock().advance();
        let applied = self.receiver.consume();
        if applied > 0 {
            debug!(tick, applied, "updates applied");
        }
        applied
    }

    /// Takes or releases an object for editing and tells the other peers.
    pub fn lock_object(&self, object_id: u16, locked: bool) -> Result<(), TransportError> {
        if let Some(object) = self.core.scene().object(object_id) {
            object.set_locked(locked);
        }
        self.sender.send_lock(object_id, locked)
    }

    /// Records the current value of an edited parameter in the shared history.
    pub fn record_edit(&self, object_id: u16, parameter_id: u16) -> Result<(), TransportError> {
        let scene = self.core.scene();
        let Some(parameter) = scene
            .registry()
            .and_then(|registry| registry.parameter(object_id, parameter_id).cloned())
        else {
            debug!(object_id, parameter_id, "edit of unknown parameter not recorded");
            return Ok(());
        };
        scene
            .history()
            .add_step(object_id, parameter_id, parameter.value());
        self.history_changed();
        self.sender.send_undo_redo_add(object_id, parameter_id)
    }

    /// Undoes the last step; the restored value goes out as a regular update.
    pub fn undo(&self) -> Option<HistoryStep> {
        let step = self.core.scene().undo();
        self.history_changed();
        step
    }

    pub fn redo(&self) -> Option<HistoryStep> {
        let step = self.core.scene().redo();
        self.history_changed();
        step
    }

    /// Resets every object, clears the history and asks all peers to do the same.
    pub fn reset_scene(&self) -> Result<(), TransportError> {
        let Some(registry) = self.core.scene().registry() else {
            return Ok(());
        };
        self.core.scene().reset_scene();
        self.history_changed();
        for object in registry.iter() {
            self.sender.send_reset_object(object.id())?;
        }
        info!(objects = registry.len(), "scene reset");
        Ok(())
    }

    /// Stops every module and waits for their loops to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.stop().await;
        }
        self.sender.detach();
        info!("client session stopped");
    }

    fn history_changed(&self) {
        let history = self.core.scene().history();
        self.core.ui().emit(UiEvent::HistoryChanged {
            len: history.len(),
            cursor: history.cursor(),
        });
    }
}
