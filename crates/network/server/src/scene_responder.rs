use app::Core;
use bytes::Bytes;
use network_shared::ResponderSocket;
use scene::BlobKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Serves the current scene's pre-encoded blobs, one reply per request.
///
/// Unknown topics and requests while no scene is loaded get an empty reply;
/// an empty header tells the client there is no scene.
#[derive(Debug, Clone)]
pub struct SceneResponder {
    core: Core,
}

impl SceneResponder {
    pub fn new(core: Core) -> Self {
        Self { core }
    }

    pub fn answer(&self, topic: &str) -> Bytes {
        let Some(kind) = BlobKind::from_name(topic) else {
            warn!(topic, "unknown scene topic");
            return Bytes::new();
        };
        match self.core.scene().current() {
            Some(scene) => scene.blobs.get(kind).clone(),
            None => {
                debug!(topic, "scene requested before one is loaded");
                Bytes::new()
            }
        }
    }

    pub async fn serve(&self, mut socket: ResponderSocket, cancel: CancellationToken) {
        info!("scene responder ready");
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = socket.next_request() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            let body = self.answer(request.topic());
            debug!(topic = request.topic(), len = body.len(), "scene blob sent");
            request.reply(body);
        }
        socket.close().await;
        info!("scene responder stopped");
    }
}
