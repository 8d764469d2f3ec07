use std::{io, time::Duration};

use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- Result ----------------------------------------------------------------

pub type Result<T, E = TransportError> = std::result::Result<T, E>;

// -----------------------------------------------------------------------------
// ----- TransportError --------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    // -- Lifecycle preconditions --
    #[error("socket already bound")]
    AlreadyBound,

    #[error("socket unbound")]
    NotBound,

    #[error("socket already connected")]
    AlreadyConnected,

    #[error("socket already listening")]
    AlreadyListening,

    #[error("socket disconnected")]
    NotConnected,

    // -- Establishment --
    #[error("couldn't bind to any address for port {port}")]
    NoBindableAddress { port: u16 },

    #[error("couldn't connect to any address for {host}:{port}")]
    NoConnectableAddress { host: String, port: u16 },

    #[error("couldn't resolve {host}:{port}: {source}")]
    ResolutionFailed {
        host: String,
        port: u16,
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    #[error("couldn't listen for connections: {source}")]
    ListenFailed {
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    #[error("couldn't accept a connection after {attempts} attempt(s): {source}")]
    AcceptFailed {
        code: Option<i32>,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("no peer connected within {0:?}")]
    AcceptTimedOut(Duration),

    // -- Data transfer --
    #[error("couldn't send data: {source}")]
    SendFailed {
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    #[error("couldn't receive data: {source}")]
    RecvFailed {
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    #[error("{op} timed out after {after:?}")]
    TimedOut { op: &'static str, after: Duration },

    // -- Framing --
    #[error("invalid received packet length: expected {expected} bytes, got {received}")]
    InvalidPacketLength { expected: usize, received: usize },

    #[error("packet declares {count} payload bytes but at most {max} fit")]
    InvalidPayloadLength { count: u8, max: usize },

    #[error("packet size must be between 1 and 255, got {0}")]
    InvalidPacketSize(u16),

    #[error("packet size 1 carries no payload; cannot send {len} bytes")]
    DegeneratePacketSize { len: usize },

    #[error("message ended without a terminating short packet")]
    UnterminatedMessage,

    #[error("{extra} bytes follow the end of the message")]
    TrailingBytes { extra: usize },
}

// -----------------------------------------------------------------------------
// ----- TransportError: Static ------------------------------------------------

impl TransportError {
    pub(crate) fn send_failed(source: io::Error) -> Self {
        Self::SendFailed {
            code: source.raw_os_error(),
            source,
        }
    }

    pub(crate) fn recv_failed(source: io::Error) -> Self {
        Self::RecvFailed {
            code: source.raw_os_error(),
            source,
        }
    }

    pub(crate) fn listen_failed(source: io::Error) -> Self {
        Self::ListenFailed {
            code: source.raw_os_error(),
            source,
        }
    }

    pub(crate) fn accept_failed(source: io::Error, attempts: u32) -> Self {
        Self::AcceptFailed {
            code: source.raw_os_error(),
            attempts,
            source,
        }
    }

    pub(crate) fn resolution_failed(host: &str, port: u16, source: io::Error) -> Self {
        Self::ResolutionFailed {
            host: host.to_string(),
            port,
            code: source.raw_os_error(),
            source,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- TransportError: Public ------------------------------------------------

impl TransportError {
    /// OS error number behind the failure, when there is one.
    pub fn os_error_code(&self) -> Option<i32> {
        match self {
            Self::ResolutionFailed { code, .. }
            | Self::ListenFailed { code, .. }
            | Self::AcceptFailed { code, .. }
            | Self::SendFailed { code, .. }
            | Self::RecvFailed { code, .. } => *code,
            _ => None,
        }
    }

    /// The peer shut the connection down cleanly between two packets.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, Self::InvalidPacketLength { received: 0, .. })
    }

    /// Precondition violations: the endpoint was used in the wrong state and
    /// no I/O took place.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::AlreadyBound
                | Self::NotBound
                | Self::AlreadyConnected
                | Self::AlreadyListening
                | Self::NotConnected
        )
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
