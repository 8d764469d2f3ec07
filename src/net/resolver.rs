//! net::resolver
//!
//! Host/port to candidate socket addresses, and the "try each candidate
//! until one works" loop shared by bind and connect.

use std::{
    fmt,
    future::Future,
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
};

use tokio::net::{TcpSocket, lookup_host};
use tracing::debug;

use crate::errors::{Result, TransportError};

// -----------------------------------------------------------------------------
// ----- Host ------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Host {
    /// Every local interface.
    Any,
    /// A DNS name or an IP literal.
    Name(String),
}

impl Host {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "*" => Host::Any,
            any if any.eq_ignore_ascii_case("any") => Host::Any,
            name => Host::Name(name.to_string()),
        }
    }
}

impl From<&str> for Host {
    fn from(raw: &str) -> Self {
        Host::parse(raw)
    }
}

impl From<String> for Host {
    fn from(raw: String) -> Self {
        Host::parse(&raw)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Any => f.write_str("any"),
            Host::Name(name) => f.write_str(name),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- resolve ---------------------------------------------------------------

/// Ordered candidate addresses for `host:port`.
pub async fn resolve(host: &Host, port: u16) -> Result<Vec<SocketAddr>> {
    let name = match host {
        Host::Any => return Ok(wildcard(port)),
        Host::Name(name) => name.as_str(),
    };

    let candidates: Vec<SocketAddr> = lookup_host((name, port))
        .await
        .map_err(|e| TransportError::resolution_failed(name, port, e))?
        .collect();

    if candidates.is_empty() {
        let empty = io::Error::new(io::ErrorKind::NotFound, "no addresses returned");
        return Err(TransportError::resolution_failed(name, port, empty));
    }

    debug!(host = name, port, count = candidates.len(), "resolved candidates");
    Ok(candidates)
}

/// Wildcard addresses for a passive (listening) socket, IPv4 first.
pub fn wildcard(port: u16) -> Vec<SocketAddr> {
    vec![
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
    ]
}

// -----------------------------------------------------------------------------
// ----- first_success ---------------------------------------------------------

/// Run `attempt` against each candidate in order and keep the first success.
/// Failed attempts drop whatever they created before the next one starts.
pub async fn first_success<T, F, Fut>(
    candidates: &[SocketAddr],
    mut attempt: F,
) -> Option<(SocketAddr, T)>
where
    F: FnMut(SocketAddr) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    for &addr in candidates {
        match attempt(addr).await {
            Ok(value) => return Some((addr, value)),
            Err(e) => debug!(%addr, error = %e, "candidate failed"),
        }
    }

    None
}

// -----------------------------------------------------------------------------
// ----- new_socket ------------------------------------------------------------

/// Fresh TCP socket in the address family of `addr`.
pub fn new_socket(addr: &SocketAddr) -> io::Result<TcpSocket> {
    match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
