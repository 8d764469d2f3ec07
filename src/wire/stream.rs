//! wire::stream
//!
//! Packet-level I/O over any tokio byte stream. `PacketWriter` sends one
//! packet at a time, `PacketReader` hands back exactly one packet at a time,
//! looping over short reads and keeping bytes that belong to the next packet.

use std::{future::Future, time::Duration};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::errors::{Result, TransportError};

use super::{FramingCodec, MessageAssembler, PacketSize, packet::put_packet};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const READ_CAPACITY_HINT: usize = 4096;

// -----------------------------------------------------------------------------
// ----- PacketWriter ----------------------------------------------------------

#[derive(Debug)]
pub struct PacketWriter<W> {
    inner: W,
    codec: FramingCodec,
    scratch: BytesMut,
    timeout: Option<Duration>,
}

impl<W> PacketWriter<W> {
    pub fn new(inner: W, codec: FramingCodec) -> Self {
        Self {
            inner,
            codec,
            scratch: BytesMut::with_capacity(codec.packet_size().get()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn packet_size(&self) -> PacketSize {
        self.codec.packet_size()
    }
}

// -----------------------------------------------------------------------------
// ----- PacketWriter: Public --------------------------------------------------

impl<W: AsyncWrite + Unpin> PacketWriter<W> {
    /// Send one packet carrying `chunk` (at most `packet_size - 1` bytes).
    pub async fn send_packet(&mut self, chunk: &[u8]) -> Result<()> {
        self.scratch.clear();
        put_packet(&mut self.scratch, chunk, self.codec.packet_size());

        let inner = &mut self.inner;
        let packet = &self.scratch[..];
        with_timeout(self.timeout, "send", async move {
            inner.write_all(packet).await?;
            inner.flush().await
        })
        .await?
        .map_err(TransportError::send_failed)
    }

    /// Send a whole message. Returns the number of packets written.
    pub async fn send_message(&mut self, message: &[u8]) -> Result<usize> {
        let chunks = self.codec.chunks(message)?;

        let mut sent = 0;
        for chunk in chunks {
            self.send_packet(chunk).await?;
            sent += 1;
        }

        trace!(bytes = message.len(), packets = sent, "message sent");
        Ok(sent)
    }

    /// Half-close the stream so the peer reads a clean end of stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(TransportError::send_failed)
    }
}

// -----------------------------------------------------------------------------
// ----- PacketReader ----------------------------------------------------------

#[derive(Debug)]
pub struct PacketReader<R> {
    inner: R,
    codec: FramingCodec,
    inbox: BytesMut,
    assembler: MessageAssembler,
    timeout: Option<Duration>,
}

impl<R> PacketReader<R> {
    pub fn new(inner: R, codec: FramingCodec) -> Self {
        Self {
            inner,
            codec,
            inbox: BytesMut::with_capacity(READ_CAPACITY_HINT),
            assembler: codec.assembler(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn packet_size(&self) -> PacketSize {
        self.codec.packet_size()
    }
}

// -----------------------------------------------------------------------------
// ----- PacketReader: Public --------------------------------------------------

impl<R: AsyncRead + Unpin> PacketReader<R> {
    /// Receive exactly one raw packet (`packet_size` bytes).
    pub async fn recv_packet(&mut self) -> Result<BytesMut> {
        let size = self.codec.packet_size().get();

        let inner = &mut self.inner;
        let inbox = &mut self.inbox;
        with_timeout(self.timeout, "recv", async move {
            while inbox.len() < size {
                inbox.reserve(READ_CAPACITY_HINT.max(size));

                let n = inner
                    .read_buf(inbox)
                    .await
                    .map_err(TransportError::recv_failed)?;
                if n == 0 {
                    return Err(TransportError::InvalidPacketLength {
                        expected: size,
                        received: inbox.len(),
                    });
                }
            }

            Ok::<_, TransportError>(inbox.split_to(size))
        })
        .await?
    }

    /// Receive packets until a short one completes the message.
    pub async fn recv_message(&mut self) -> Result<Bytes> {
        loop {
            let packet = self.recv_packet().await?;
            if let Some(message) = self.assembler.push(&packet)? {
                trace!(bytes = message.len(), "message received");
                return Ok(message);
            }
        }
    }

    /// Bytes already read off the stream that belong to packets not yet
    /// handed out.
    pub fn buffered(&self) -> usize {
        self.inbox.len()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

async fn with_timeout<T, F>(limit: Option<Duration>, op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| TransportError::TimedOut { op, after }),
        None => Ok(fut.await),
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn codec(n: u8) -> FramingCodec {
        FramingCodec::new(PacketSize::new(n).unwrap())
    }

    #[tokio::test]
    async fn message_crosses_a_duplex_pipe() {
        let (a, b) = duplex(64);
        let mut writer = PacketWriter::new(a, codec(16));
        let mut reader = PacketReader::new(b, codec(16));

        let message: Vec<u8> = (0..100).collect();
        let send = async {
            let sent = writer.send_message(&message).await.unwrap();
            assert_eq!(sent, 7);
        };
        let recv = async { reader.recv_message().await.unwrap() };

        let ((), got) = tokio::join!(send, recv);
        assert_eq!(&got[..], &message[..]);
    }

    #[tokio::test]
    async fn short_reads_are_reassembled() {
        let (mut raw, b) = duplex(1);
        let mut reader = PacketReader::new(b, codec(8));

        let wire = codec(8).encode(b"hello world").unwrap();
        let trickle = async move {
            for byte in wire.iter() {
                raw.write_all(&[*byte]).await.unwrap();
            }
            raw
        };

        let (_raw, got) = tokio::join!(trickle, reader.recv_message());
        assert_eq!(&got.unwrap()[..], b"hello world");
    }

    #[tokio::test]
    async fn merged_packets_stay_buffered() {
        let (mut raw, b) = duplex(1024);
        let mut reader = PacketReader::new(b, codec(4));

        let mut wire = codec(4).encode(b"ab").unwrap();
        wire.extend_from_slice(&codec(4).encode(b"cdef").unwrap());
        raw.write_all(&wire).await.unwrap();

        assert_eq!(&reader.recv_message().await.unwrap()[..], b"ab");
        assert_eq!(reader.buffered(), 8);
        assert_eq!(&reader.recv_message().await.unwrap()[..], b"cdef");
        assert_eq!(reader.buffered(), 0);
    }

    #[tokio::test]
    async fn eof_mid_packet_is_invalid_length() {
        let (mut raw, b) = duplex(64);
        let mut reader = PacketReader::new(b, codec(8));

        raw.write_all(&[3, 1, 2]).await.unwrap();
        drop(raw);

        let err = reader.recv_packet().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::InvalidPacketLength {
                expected: 8,
                received: 3
            }
        ));
        assert!(!err.is_peer_closed());
    }

    #[tokio::test]
    async fn eof_at_boundary_is_peer_closed() {
        let (raw, b) = duplex(64);
        let mut reader = PacketReader::new(b, codec(8));
        drop(raw);

        let err = reader.recv_message().await.unwrap_err();
        assert!(err.is_peer_closed());
    }

    #[tokio::test]
    async fn recv_times_out() {
        let (_raw, b) = duplex(64);
        let mut reader =
            PacketReader::new(b, codec(8)).with_timeout(Some(Duration::from_millis(20)));

        let err = reader.recv_packet().await.unwrap_err();
        assert!(matches!(err, TransportError::TimedOut { op: "recv", .. }));
    }

    #[tokio::test]
    async fn send_to_closed_pipe_fails() {
        let (a, b) = duplex(64);
        drop(b);
        let mut writer = PacketWriter::new(a, codec(8));

        let err = writer.send_message(b"gone").await.unwrap_err();
        assert!(matches!(err, TransportError::SendFailed { .. }));
    }
}
