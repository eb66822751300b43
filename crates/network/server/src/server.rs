use std::net::SocketAddr;
use std::sync::Arc;

use app::Core;
use network_shared::transport::tcp::{TcpFanout, bind_collector, bind_responder};
use network_shared::{
    FramePublisher, ModuleKind, ModuleTask, ResponderSocket, SubscriberSocket, TransportError,
};
use scene::SceneError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::relay::{ObjectStateCache, UpdateRelay};
use crate::scene_responder::SceneResponder;
use crate::sync::SyncBroadcaster;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("the server core must run with the server identity")]
    NotAServer,
}

/// Sockets a server runs on, whatever transport they come from.
pub struct ServerSockets {
    pub responder: ResponderSocket,
    pub collector: SubscriberSocket,
    pub publisher: Arc<dyn FramePublisher>,
}

/// Bound addresses of a TCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerEndpoints {
    pub scene: SocketAddr,
    pub update: SocketAddr,
    pub collect: SocketAddr,
}

/// The synchronisation server: scene responder, update relay and SYNC clock.
#[derive(Debug)]
pub struct SyncServer {
    core: Core,
    cache: Arc<ObjectStateCache>,
    cancel: CancellationToken,
    tasks: Vec<ModuleTask>,
    fanout: Option<Arc<TcpFanout>>,
    endpoints: Option<ServerEndpoints>,
}

impl SyncServer {
    /// Binds the three TCP endpoints on `host` using the configured ports.
    /// Port `0` picks a free port; see [`SyncServer::endpoints`].
    pub async fn bind_tcp(core: Core, host: &str) -> Result<Self, ServerError> {
        let network = core.settings().network.clone();
        let cache = Arc::new(ObjectStateCache::new());

        let (responder, scene) =
            bind_responder(&format!("{host}:{}", network.scene_port), network.max_frame_bytes).await?;
        let fanout = Arc::new(
            TcpFanout::bind(
                &format!("{host}:{}", network.update_port),
                Some(cache.snapshot_fn(Arc::clone(core.clock()))),
            )
            .await?,
        );
        let (collector, collect) =
            bind_collector(&format!("{host}:{}", network.collect_port), network.max_frame_bytes)
                .await?;

        let endpoints = ServerEndpoints {
            scene,
            update: fanout.local_addr(),
            collect,
        };
        info!(
            scene = %endpoints.scene,
            update = %endpoints.update,
            collect = %endpoints.collect,
            "sync server bound"
        );

        let sockets = ServerSockets {
            responder,
            collector,
            publisher: fanout.clone(),
        };
        let mut server = Self::start_with_cache(core, sockets, cache)?;
        server.fanout = Some(fanout);
        server.endpoints = Some(endpoints);
        Ok(server)
    }

    /// Starts every server module on the given sockets.
    pub fn start(core: Core, sockets: ServerSockets) -> Result<Self, ServerError> {
        Self::start_with_cache(core, sockets, Arc::new(ObjectStateCache::new()))
    }

    fn start_with_cache(
        core: Core,
        sockets: ServerSockets,
        cache: Arc<ObjectStateCache>,
    ) -> Result<Self, ServerError> {
        if !core.network().is_server {
            return Err(ServerError::NotAServer);
        }
        if !core.scene().is_loaded() {
            warn!("starting without a scene, clients will be refused");
        }

        let ServerSockets {
            responder,
            collector,
            publisher,
        } = sockets;
        let mut responder = Some(responder);
        let mut collector = Some(collector);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(ModuleKind::SERVER.len());

        for kind in ModuleKind::SERVER {
            match kind {
                ModuleKind::SceneResponder => {
                    if let Some(socket) = responder.take() {
                        let module = SceneResponder::new(core.clone());
                        tasks.push(ModuleTask::spawn(*kind, &cancel, move |cancel| async move {
                            module.serve(socket, cancel).await
                        }));
                    }
                }
                ModuleKind::UpdateRelay => {
                    if let Some(socket) = collector.take() {
                        let module =
                            UpdateRelay::new(core.clone(), Arc::clone(&cache), Arc::clone(&publisher));
                        tasks.push(ModuleTask::spawn(*kind, &cancel, move |cancel| async move {
                            module.run(socket, cancel).await
                        }));
                    }
                }
                ModuleKind::SyncBroadcaster => {
                    let module = SyncBroadcaster::new(core.clone(), Arc::clone(&publisher));
                    tasks.push(ModuleTask::spawn(*kind, &cancel, move |cancel| async move {
                        module.run(cancel).await
                    }));
                }
                other => warn!(module = %other, "not a server module"),
            }
        }

        Ok(Self {
            core,
            cache,
            cancel,
            tasks,
            fanout: None,
            endpoints: None,
        })
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn cache(&self) -> &Arc<ObjectStateCache> {
        &self.cache
    }

    pub fn endpoints(&self) -> Option<ServerEndpoints> {
        self.endpoints
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleKind> + '_ {
        self.tasks.iter().map(ModuleTask::kind)
    }

    /// Stops all modules, then disconnects the subscribers.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.stop().await;
        }
        if let Some(fanout) = self.fanout.take() {
            fanout.close().await;
        }
        info!("sync server stopped");
    }
}
