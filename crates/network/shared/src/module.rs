//! Registration of the network modules each peer role runs.

use std::fmt;
use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    SceneReceiver,
    UpdateReceiver,
    UpdateSender,
    SceneResponder,
    UpdateRelay,
    SyncBroadcaster,
}

impl ModuleKind {
    /// Modules of a client session, in start order.
    pub const CLIENT: &'static [ModuleKind] = &[
        ModuleKind::SceneReceiver,
        ModuleKind::UpdateReceiver,
        ModuleKind::UpdateSender,
    ];

    /// Modules of a sync server, in start order.
    pub const SERVER: &'static [ModuleKind] = &[
        ModuleKind::SceneResponder,
        ModuleKind::UpdateRelay,
        ModuleKind::SyncBroadcaster,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModuleKind::SceneReceiver => "scene_receiver",
            ModuleKind::UpdateReceiver => "update_receiver",
            ModuleKind::UpdateSender => "update_sender",
            ModuleKind::SceneResponder => "scene_responder",
            ModuleKind::UpdateRelay => "update_relay",
            ModuleKind::SyncBroadcaster => "sync_broadcaster",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A running module: its task and the token that stops it.
#[derive(Debug)]
pub struct ModuleTask {
    kind: ModuleKind,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ModuleTask {
    /// Spawns `run` with a child of `parent`, so cancelling the parent stops
    /// every module at once.
    pub fn spawn<F, Fut>(kind: ModuleKind, parent: &CancellationToken, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = parent.child_token();
        let handle = tokio::spawn(run(cancel.clone()));
        info!(module = %kind, "module started");
        Self {
            kind,
            cancel,
            handle,
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the module and waits until its loop has returned.
    pub async fn stop(self) {
        self.cancel.cancel();
        match self.handle.await {
            Ok(()) => debug!(module = %self.kind, "module stopped"),
            Err(err) => warn!(module = %self.kind, %err, "module task ended abnormally"),
        }
    }
}
