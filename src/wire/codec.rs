//! wire::codec
//!
//! Pure message <-> packet conversion. No I/O happens here; the stream
//! module feeds these types one packet at a time.
//!
//! A message is cut into strides of at most `packet_size - 1` bytes and is
//! always closed by a short stride. When the length is an exact multiple of
//! the stride (the empty message included) the closing stride is empty, so
//! the receiver never waits for a packet that will not come.

use bytes::{Bytes, BytesMut};

use crate::errors::{Result, TransportError};

use super::{
    PacketSize,
    packet::{parse_packet, put_packet},
};

// -----------------------------------------------------------------------------
// ----- FramingCodec ----------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramingCodec {
    packet_size: PacketSize,
}

impl FramingCodec {
    pub fn new(packet_size: PacketSize) -> Self {
        Self { packet_size }
    }
}

// -----------------------------------------------------------------------------
// ----- FramingCodec: Public --------------------------------------------------

impl FramingCodec {
    #[inline]
    pub fn packet_size(&self) -> PacketSize {
        self.packet_size
    }

    /// Number of packets a message of `len` bytes occupies on the wire.
    pub fn packet_count(&self, len: usize) -> usize {
        match self.packet_size.max_payload() {
            0 => 1,
            max => len / max + 1,
        }
    }

    pub fn chunks<'a>(&self, message: &'a [u8]) -> Result<Chunks<'a>> {
        if self.packet_size.is_degenerate() && !message.is_empty() {
            return Err(TransportError::DegeneratePacketSize { len: message.len() });
        }

        Ok(Chunks {
            rest: message,
            stride: self.packet_size.max_payload(),
            done: false,
        })
    }

    /// Encode a whole message into one contiguous wire buffer.
    pub fn encode(&self, message: &[u8]) -> Result<BytesMut> {
        let chunks = self.chunks(message)?;
        let capacity = self.packet_count(message.len()) * self.packet_size.get();
        let mut out = BytesMut::with_capacity(capacity);
        for chunk in chunks {
            put_packet(&mut out, chunk, self.packet_size);
        }

        Ok(out)
    }

    /// Decode exactly one message from a complete wire buffer.
    pub fn decode(&self, wire: &[u8]) -> Result<Bytes> {
        let size = self.packet_size.get();
        let mut assembler = self.assembler();

        let mut offset = 0;
        while offset < wire.len() {
            let end = (offset + size).min(wire.len());
            let done = assembler.push(&wire[offset..end])?;
            offset = end;

            if let Some(message) = done {
                if offset < wire.len() {
                    return Err(TransportError::TrailingBytes {
                        extra: wire.len() - offset,
                    });
                }
                return Ok(message);
            }
        }

        Err(TransportError::UnterminatedMessage)
    }

    pub fn assembler(&self) -> MessageAssembler {
        MessageAssembler::new(self.packet_size)
    }
}

// -----------------------------------------------------------------------------
// ----- Chunks ----------------------------------------------------------------

/// Iterator over the payload strides of one message, closing stride included.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a [u8],
    stride: usize,
    done: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.done {
            return None;
        }

        if self.rest.len() < self.stride || self.stride == 0 {
            self.done = true;
            return Some(std::mem::take(&mut self.rest));
        }

        let (head, tail) = self.rest.split_at(self.stride);
        self.rest = tail;
        Some(head)
    }
}

// -----------------------------------------------------------------------------
// ----- MessageAssembler ------------------------------------------------------

/// Incremental decoder: push whole packets, get a message back once a short
/// packet arrives.
#[derive(Debug)]
pub struct MessageAssembler {
    packet_size: PacketSize,
    buffer: BytesMut,
    packets: usize,
}

impl MessageAssembler {
    pub fn new(packet_size: PacketSize) -> Self {
        Self {
            packet_size,
            buffer: BytesMut::new(),
            packets: 0,
        }
    }

    /// A malformed packet fails the whole message in progress; the next push
    /// starts a fresh one.
    pub fn push(&mut self, packet: &[u8]) -> Result<Option<Bytes>> {
        let packet = match parse_packet(packet, self.packet_size) {
            Ok(packet) => packet,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };

        self.buffer.extend_from_slice(packet.payload);
        self.packets += 1;

        if !packet.last {
            return Ok(None);
        }

        self.packets = 0;
        Ok(Some(self.buffer.split().freeze()))
    }

    /// Packets received so far for the message in progress.
    pub fn pending_packets(&self) -> usize {
        self.packets
    }

    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the message in progress.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.packets = 0;
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
