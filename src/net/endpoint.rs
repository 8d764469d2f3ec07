use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::net::{
    TcpListener, TcpSocket, TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};
use tracing::{debug, info, warn};

use crate::config::EndpointConfig;
use crate::errors::{Result, TransportError};
use crate::wire::{FramingCodec, PacketReader, PacketSize, PacketWriter};

use super::{
    accept::accept_with_policy,
    halves::{MessageReceiver, MessageSender},
    resolver::{self, Host},
};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// One peer per listening endpoint, for its whole lifetime.
const ACCEPT_BACKLOG: u32 = 1;

// -----------------------------------------------------------------------------
// ----- Types -----------------------------------------------------------------

pub type SendHalf = PacketWriter<OwnedWriteHalf>;
pub type RecvHalf = PacketReader<OwnedReadHalf>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Unbound,
    Bound,
    Listening,
    Connected,
}

#[derive(Debug)]
pub(crate) enum LocalHandle {
    Bound(TcpSocket),
    Listening(TcpListener),
}

impl LocalHandle {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            LocalHandle::Bound(socket) => socket.local_addr(),
            LocalHandle::Listening(listener) => listener.local_addr(),
        }
    }
}

#[derive(Debug)]
struct Peer {
    addr: SocketAddr,
    writer: SendHalf,
    reader: RecvHalf,
}

// -----------------------------------------------------------------------------
// ----- ConnectionEndpoint ----------------------------------------------------

/// One end of a point-to-point connection.
///
/// Lifecycle: `Unbound` → `bind` → `Bound` → `accept` (via `Listening`) or
/// `connect` → `Connected`. Dropping the endpoint releases the peer handle
/// and then the local handle.
#[derive(Debug)]
pub struct ConnectionEndpoint {
    config: EndpointConfig,
    codec: FramingCodec,

    // never Some while `local` is None
    peer: Option<Peer>,
    local: Option<LocalHandle>,
}

// -----------------------------------------------------------------------------
// ----- ConnectionEndpoint: Static --------------------------------------------

impl ConnectionEndpoint {
    pub fn new(packet_size: PacketSize) -> Self {
        Self::with_config(EndpointConfig::default().with_packet_size(packet_size))
    }

    pub fn with_config(config: EndpointConfig) -> Self {
        Self {
            codec: FramingCodec::new(config.packet_size),
            config,
            peer: None,
            local: None,
        }
    }
}

impl Default for ConnectionEndpoint {
    fn default() -> Self {
        Self::new(PacketSize::DEFAULT)
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionEndpoint: Accessors -----------------------------------------

impl ConnectionEndpoint {
    pub fn state(&self) -> EndpointState {
        match (&self.local, &self.peer) {
            (_, Some(_)) => EndpointState::Connected,
            (Some(LocalHandle::Listening(_)), None) => EndpointState::Listening,
            (Some(LocalHandle::Bound(_)), None) => EndpointState::Bound,
            (None, None) => EndpointState::Unbound,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.local.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    pub fn packet_size(&self) -> PacketSize {
        self.codec.packet_size()
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer.as_ref().map(|p| p.addr)
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionEndpoint: Establishment -------------------------------------

impl ConnectionEndpoint {
    /// Bind to `port` on every interface. Port 0 lets the OS pick; the
    /// address actually bound is returned.
    pub async fn bind(&mut self, port: u16) -> Result<SocketAddr> {
        if self.local.is_some() {
            return Err(TransportError::AlreadyBound);
        }

        let candidates = resolver::resolve(&Host::Any, port).await?;
        let bound =
            resolver::first_success(&candidates, |addr| async move { bind_candidate(addr) }).await;

        let Some((addr, socket)) = bound else {
            warn!(port, "couldn't bind to any address");
            return Err(TransportError::NoBindableAddress { port });
        };

        let addr = socket.local_addr().unwrap_or(addr);
        self.local = Some(LocalHandle::Bound(socket));

        info!(%addr, "socket bound");
        Ok(addr)
    }

    /// Listen and wait for the one peer this endpoint will ever accept.
    ///
    /// Dropping the returned future (or hitting the accept timeout) leaves
    /// the endpoint listening; calling `accept` again resumes the wait.
    pub async fn accept(&mut self) -> Result<SocketAddr> {
        self.ensure_can_establish()?;
        self.listen()?;

        let Some(LocalHandle::Listening(listener)) = &self.local else {
            return Err(TransportError::NotBound);
        };

        let (stream, addr) =
            accept_with_policy(&self.config.accept, move || listener.accept()).await?;

        self.attach(stream, addr);

        info!(peer = %addr, "peer accepted");
        Ok(addr)
    }

    /// Connect to `host:port` from a fresh socket, trying every resolved
    /// address in order.
    ///
    /// Only a `Bound` endpoint can connect. Once `accept` has turned the
    /// socket into a listener, the endpoint is committed to accepting.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        self.ensure_can_establish()?;
        if let Some(LocalHandle::Listening(_)) = &self.local {
            return Err(TransportError::AlreadyListening);
        }

        let host = Host::from(host);
        let candidates = resolver::resolve(&host, port).await?;

        let limit = self.config.connect_timeout;
        let connected =
            resolver::first_success(&candidates, |addr| connect_candidate(addr, limit)).await;

        let Some((addr, stream)) = connected else {
            warn!(%host, port, "couldn't connect to any address");
            return Err(TransportError::NoConnectableAddress {
                host: host.to_string(),
                port,
            });
        };

        self.attach(stream, addr);

        info!(peer = %addr, "connected");
        Ok(addr)
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionEndpoint: Data Transfer -------------------------------------

impl ConnectionEndpoint {
    pub async fn send(&mut self, message: &[u8]) -> Result<()> {
        let peer = self.peer.as_mut().ok_or(TransportError::NotConnected)?;
        peer.writer.send_message(message).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<Bytes> {
        let peer = self.peer.as_mut().ok_or(TransportError::NotConnected)?;
        peer.reader.recv_message().await
    }

    /// Borrow both directions at once, e.g. to drive them with `tokio::join!`.
    pub fn split(&mut self) -> Result<(&mut SendHalf, &mut RecvHalf)> {
        let peer = self.peer.as_mut().ok_or(TransportError::NotConnected)?;
        Ok((&mut peer.writer, &mut peer.reader))
    }

    /// Split into owned halves that can move to separate tasks. The local
    /// handle lives until both halves are dropped.
    ///
    /// Consumes the endpoint even when it is not connected.
    pub fn into_split(mut self) -> Result<(MessageSender, MessageReceiver)> {
        let Some(peer) = self.peer.take() else {
            return Err(TransportError::NotConnected);
        };
        let Some(local) = self.local.take() else {
            return Err(TransportError::NotBound);
        };

        let local = Arc::new(local);
        let sender = MessageSender::new(peer.writer, peer.addr, Arc::clone(&local));
        let receiver = MessageReceiver::new(peer.reader, peer.addr, local);

        Ok((sender, receiver))
    }

    /// Half-close the connection so the peer sees a clean end of stream,
    /// then release both handles.
    pub async fn close(mut self) -> Result<()> {
        let Some(mut peer) = self.peer.take() else {
            return Err(TransportError::NotConnected);
        };

        let res = peer.writer.shutdown().await;
        debug!(peer = %peer.addr, "connection closed");
        res
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionEndpoint: Private -------------------------------------------

impl ConnectionEndpoint {
    fn ensure_can_establish(&self) -> Result<()> {
        if self.local.is_none() {
            return Err(TransportError::NotBound);
        }
        if self.peer.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        Ok(())
    }

    /// Turn the bound socket into a listener. No-op when already listening.
    /// `listen(2)` consumes the socket, so a failure leaves the endpoint
    /// unbound.
    fn listen(&mut self) -> Result<()> {
        if !matches!(self.local, Some(LocalHandle::Bound(_))) {
            return Ok(());
        }
        let Some(LocalHandle::Bound(socket)) = self.local.take() else {
            return Err(TransportError::NotBound);
        };

        let listener = socket.listen(ACCEPT_BACKLOG).map_err(|e| {
            warn!(error = %e, "couldn't listen for connections");
            TransportError::listen_failed(e)
        })?;

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "listening");
        }

        self.local = Some(LocalHandle::Listening(listener));
        Ok(())
    }

    fn attach(&mut self, stream: TcpStream, addr: SocketAddr) {
        // best effort, like any other socket option
        let _ = stream.set_nodelay(self.config.nodelay);

        let (reader, writer) = stream.into_split();
        self.peer = Some(Peer {
            addr,
            writer: PacketWriter::new(writer, self.codec).with_timeout(self.config.io_timeout),
            reader: PacketReader::new(reader, self.codec).with_timeout(self.config.io_timeout),
        });
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionEndpoint: Drop ----------------------------------------------

impl Drop for ConnectionEndpoint {
    fn drop(&mut self) {
        if let Some(peer) = self.peer.take() {
            debug!(peer = %peer.addr, "releasing peer handle");
            drop(peer);
        }

        if let Some(local) = self.local.take() {
            debug!(addr = ?local.local_addr().ok(), "releasing local handle");
            drop(local);
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Candidates --------------------------------------------------

fn bind_candidate(addr: SocketAddr) -> io::Result<TcpSocket> {
    let socket = resolver::new_socket(&addr)?;

    // Avoid errors when another socket recently stopped listening on the port
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    Ok(socket)
}

async fn connect_candidate(addr: SocketAddr, limit: Option<Duration>) -> io::Result<TcpStream> {
    let socket = resolver::new_socket(&addr)?;

    match limit {
        Some(limit) => tokio::time::timeout(limit, socket.connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?,
        None => socket.connect(addr).await,
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
