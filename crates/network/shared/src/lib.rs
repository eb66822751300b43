//! Wire protocol and transports shared by the sync client and server.
//!
//! - [`message`]: the `[sender][tick][type][payload]` frame layout and the
//!   parameter update codec.
//! - [`client_id`]: deriving the one-byte peer id from the local address.
//! - [`transport`]: pub/sub and request/reply sockets, in-process
//!   ([`transport::loopback`]) or over TCP ([`transport::tcp`]).
//! - [`module`]: the per-role module tables and their task handles.

pub mod client_id;
pub mod message;
pub mod module;
pub mod transport;

pub use client_id::{AddressResolutionFailure, derive_client_id, local_ipv4};
pub use message::{
    Frame, FrameError, Message, MessageType, decode_parameter_update, encode_parameter_update,
};
pub use module::{ModuleKind, ModuleTask};
pub use transport::{
    FramePublisher, IncomingRequest, RequestSocket, ResponderSocket, SubscriberSocket,
    TransportError, TransportResult,
};

/// One-byte peer id carried in every frame.
pub type ClientId = u8;

/// Id used by every server process, and by clients without a usable address.
pub const SERVER_CLIENT_ID: ClientId = 254;
