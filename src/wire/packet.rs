// Helpers for building and parsing fixed-size length-prefixed packets.

use bytes::{BufMut, BytesMut};

use crate::errors::{Result, TransportError};

use super::PacketSize;

// -----------------------------------------------------------------------------
// ----- Packet ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub payload: &'a [u8],
    pub last: bool,
}

// -----------------------------------------------------------------------------
// ----- put_packet ------------------------------------------------------------

/// Append one packet carrying `chunk` to `dst`. Always writes exactly
/// `size` bytes; padding is zeroed.
pub fn put_packet(dst: &mut BytesMut, chunk: &[u8], size: PacketSize) {
    debug_assert!(chunk.len() <= size.max_payload(), "chunk larger than packet");

    dst.reserve(size.get());
    dst.put_u8(chunk.len() as u8);
    dst.extend_from_slice(chunk);
    dst.put_bytes(0, size.max_payload() - chunk.len());
}

// -----------------------------------------------------------------------------
// ----- parse_packet ----------------------------------------------------------

pub fn parse_packet(raw: &[u8], size: PacketSize) -> Result<Packet<'_>> {
    if raw.len() != size.get() {
        return Err(TransportError::InvalidPacketLength {
            expected: size.get(),
            received: raw.len(),
        });
    }

    let count = raw[0];
    let max = size.max_payload();
    if count as usize > max {
        return Err(TransportError::InvalidPayloadLength { count, max });
    }

    Ok(Packet {
        payload: &raw[1..=count as usize],
        last: is_last(count as usize, size),
    })
}

/// A packet ends its message when it is short. With no room for payload at
/// all, every packet is its own (empty) message.
#[inline]
pub fn is_last(count: usize, size: PacketSize) -> bool {
    size.is_degenerate() || count < size.max_payload()
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
