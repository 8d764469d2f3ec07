// net/mod.rs
//! Networking layer: address resolution, connection establishment, and the
//! endpoint that ties a socket pair to the framing codec.

pub mod accept;
pub mod endpoint;
pub mod halves;
pub mod resolver;

pub use accept::accept_with_policy;
pub use endpoint::{ConnectionEndpoint, EndpointState, RecvHalf, SendHalf};
pub use halves::{MessageReceiver, MessageSender};
pub use resolver::{Host, resolve};
