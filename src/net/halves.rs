//! Owned halves of a connected endpoint, for driving each direction from its
//! own task. Both hold the endpoint's local handle; it is released when the
//! second half drops.

use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;

use crate::errors::Result;
use crate::wire::PacketSize;

use super::endpoint::{LocalHandle, RecvHalf, SendHalf};

// -----------------------------------------------------------------------------
// ----- MessageSender ---------------------------------------------------------

#[derive(Debug)]
pub struct MessageSender {
    // field order is drop order: peer direction first
    writer: SendHalf,
    peer: SocketAddr,
    _local: Arc<LocalHandle>,
}

impl MessageSender {
    pub(crate) fn new(writer: SendHalf, peer: SocketAddr, local: Arc<LocalHandle>) -> Self {
        Self {
            writer,
            peer,
            _local: local,
        }
    }

    pub async fn send(&mut self, message: &[u8]) -> Result<()> {
        self.writer.send_message(message).await?;
        Ok(())
    }

    /// Half-close: the peer's receiver sees end of stream after the last
    /// message sent.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn packet_size(&self) -> PacketSize {
        self.writer.packet_size()
    }
}

// -----------------------------------------------------------------------------
// ----- MessageReceiver -------------------------------------------------------

#[derive(Debug)]
pub struct MessageReceiver {
    reader: RecvHalf,
    peer: SocketAddr,
    _local: Arc<LocalHandle>,
}

impl MessageReceiver {
    pub(crate) fn new(reader: RecvHalf, peer: SocketAddr, local: Arc<LocalHandle>) -> Self {
        Self {
            reader,
            peer,
            _local: local,
        }
    }

    pub async fn recv(&mut self) -> Result<Bytes> {
        self.reader.recv_message().await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn packet_size(&self) -> PacketSize {
        self.reader.packet_size()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
