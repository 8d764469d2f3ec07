pub mod config;
pub mod errors;
pub mod net;
pub mod wire;

pub use config::{AcceptPolicy, Config, EndpointConfig};
pub use errors::{Result, TransportError};
pub use net::{ConnectionEndpoint, EndpointState, MessageReceiver, MessageSender};
pub use wire::{FramingCodec, PacketSize};
