//! Synchronisation server.
//!
//! Holds the authoritative scene and the master clock. Clients fetch the
//! scene from the [`SceneResponder`], publish their edits to the collector
//! and receive everyone's edits through the [`UpdateRelay`].

mod relay;
mod scene_responder;
mod server;
mod sync;

pub use relay::{ObjectStateCache, UpdateRelay};
pub use scene_responder::SceneResponder;
pub use server::{ServerEndpoints, ServerError, ServerSockets, SyncServer};
pub use sync::SyncBroadcaster;
