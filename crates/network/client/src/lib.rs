//! Client side of the scene synchronisation.
//!
//! A [`ClientSession`] fetches the scene once through the [`SceneReceiver`],
//! then keeps it in step with the other peers: the [`UpdateReceiver`] parks
//! incoming parameter updates in a tick-indexed [`MessageBuffer`] and the
//! [`UpdateSender`] publishes local edits.

mod ring_buffer;
mod scene_receiver;
mod session;
mod update_receiver;
mod update_sender;

pub use ring_buffer::MessageBuffer;
pub use scene_receiver::{SceneReceiver, SceneTransferError, fetch_blobs};
pub use session::{ClientError, ClientSession};
pub use update_receiver::{Dispatch, ModuleState, UpdateReceiver};
pub use update_sender::UpdateSender;
