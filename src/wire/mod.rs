//! Wire format: fixed-size length-prefixed packets and the message framing
//! built on top of them.

pub mod codec;
pub mod packet;
pub mod packet_size;
pub mod stream;

pub use codec::{Chunks, FramingCodec, MessageAssembler};
pub use packet::{Packet, parse_packet, put_packet};
pub use packet_size::{DEFAULT_PACKET_SIZE, PacketSize};
pub use stream::{PacketReader, PacketWriter};
