use std::sync::Arc;
use std::time::Duration;

use app::{Core, UiEvent};
use network_shared::transport::tcp::connect_requester;
use network_shared::{RequestSocket, TransportError};
use scene::{BlobKind, LoadedScene, SceneBlobs, SceneError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SceneTransferError {
    #[error("requesting `{topic}` failed: {source}")]
    Transport {
        topic: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("server has no scene loaded")]
    MissingHeader,

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Fetches the six scene blobs over request/reply and installs the scene.
#[derive(Debug, Clone)]
pub struct SceneReceiver {
    core: Core,
}

impl SceneReceiver {
    pub fn new(core: Core) -> Self {
        Self { core }
    }

    pub async fn connect(&self) -> Result<RequestSocket, SceneTransferError> {
        let network = &self.core.settings().network;
        connect_requester(&network.scene_endpoint(), network.max_frame_bytes)
            .await
            .map_err(|source| SceneTransferError::Transport {
                topic: BlobKind::Header.name(),
                source,
            })
    }

    /// Requests every blob, closes `socket` and loads the result.
    ///
    /// The scene is only built once all six replies arrived. On any failure
    /// the previously loaded scene stays current and a single
    /// [`UiEvent::SceneLoadFailed`] is emitted.
    pub async fn receive(&self, mut socket: RequestSocket) -> Result<Arc<LoadedScene>, SceneTransferError> {
        let timeout = self.core.settings().network.request_timeout();
        let fetched = fetch_blobs(&mut socket, timeout).await;
        socket.close().await;

        let result = fetched.and_then(|blobs| {
            if !blobs.is_ready() {
                return Err(SceneTransferError::MissingHeader);
            }
            Ok(self.core.scene().load_blobs(blobs)?)
        });

        match &result {
            Ok(scene) => {
                info!(objects = scene.registry.len(), "scene received");
                self.core.ui().emit(UiEvent::SceneReceived {
                    objects: scene.registry.len(),
                });
            }
            Err(err) => {
                warn!(%err, "scene transfer failed");
                self.core.ui().emit(UiEvent::SceneLoadFailed(err.to_string()));
            }
        }
        result
    }
}

/// Requests the blobs in their fixed order, one reply per request.
pub async fn fetch_blobs(
    socket: &mut RequestSocket,
    timeout: Duration,
) -> Result<SceneBlobs, SceneTransferError> {
    let mut blobs = SceneBlobs::default();
    for kind in BlobKind::ALL {
        let topic = kind.name();
        let body = socket
            .request(topic, timeout)
            .await
            .map_err(|source| SceneTransferError::Transport { topic, source })?;
        debug!(topic, len = body.len(), "blob received");
        blobs.set(kind, body);
    }
    Ok(blobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use app::NetworkIdentity;
    use bytes::Bytes;
    use network_shared::transport::loopback::request_pair;
    use settings::SyncSettings;

    fn core() -> Core {
        let mut settings = SyncSettings::default();
        settings.network.request_timeout_ms = 500;
        Core::new(
            settings,
            NetworkIdentity {
                client_id: 5,
                is_server: false,
            },
        )
    }

    #[tokio::test]
    async fn empty_header_is_not_a_scene() {
        let core = core();
        let mut ui = core.ui().take_receiver().unwrap();
        let (requester, mut responder) = request_pair();
        let server = tokio::spawn(async move {
            while let Some(request) = responder.next_request().await {
                request.reply(Bytes::new());
            }
        });

        let err = SceneReceiver::new(core.clone())
            .receive(requester)
            .await
            .unwrap_err();
        assert!(matches!(err, SceneTransferError::MissingHeader));
        assert!(!core.scene().is_loaded());
        assert!(matches!(ui.try_recv(), Ok(UiEvent::SceneLoadFailed(_))));
        assert!(ui.try_recv().is_err());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn fetch_stops_at_the_first_failed_request() {
        let (mut requester, mut responder) = request_pair();
        let server = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(request) = responder.next_request().await {
                seen.push(request.topic().to_owned());
                if request.topic() == "objects" {
                    drop(request);
                } else {
                    request.reply(Bytes::from_static(b"x"));
                }
            }
            seen
        });

        let err = fetch_blobs(&mut requester, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SceneTransferError::Transport {
                topic: "objects",
                ..
            }
        ));
        requester.close().await;
        assert_eq!(server.await.unwrap(), ["header", "nodes", "objects"]);
    }
}
