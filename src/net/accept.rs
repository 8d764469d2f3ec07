//! net::accept
//!
//! Waiting for the single peer of a listening endpoint. Transient accept
//! failures back off and retry, fatal ones surface, and the whole wait can be
//! bounded by a timeout.

use std::{future::Future, io, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::AcceptPolicy;
use crate::errors::{Result, TransportError};

// -----------------------------------------------------------------------------
// ----- accept_with_policy ----------------------------------------------------

/// Drive `accept` until it yields a peer or `policy` gives up.
pub async fn accept_with_policy<T, F, Fut>(policy: &AcceptPolicy, accept: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let waiting = retry_accept(policy, accept);

    match policy.timeout {
        Some(limit) => timeout(limit, waiting)
            .await
            .map_err(|_| TransportError::AcceptTimedOut(limit))?,
        None => waiting.await,
    }
}

/// Errors a listening socket can recover from on its own: the half-open
/// connection went away, the call was interrupted, or the process ran out of
/// memory or descriptors for the moment.
pub fn is_transient(err: &io::Error) -> bool {
    let by_kind = matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::OutOfMemory
    );

    by_kind || is_descriptor_exhaustion(err)
}

// -----------------------------------------------------------------------------
// ----- Internal: Descriptor limits -------------------------------------------

// Same values on Linux, macOS and the BSDs.
#[cfg(unix)]
const ENFILE: i32 = 23;
#[cfg(unix)]
const EMFILE: i32 = 24;

#[cfg(unix)]
fn is_descriptor_exhaustion(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(EMFILE | ENFILE))
}

#[cfg(not(unix))]
fn is_descriptor_exhaustion(_err: &io::Error) -> bool {
    false
}

// -----------------------------------------------------------------------------
// ----- Internal: Retry loop --------------------------------------------------

async fn retry_accept<T, F, Fut>(policy: &AcceptPolicy, mut accept: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut backoff = Backoff::new(policy.initial_backoff, policy.max_backoff);
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);

        let err = match accept().await {
            Ok(peer) => return Ok(peer),
            Err(e) => e,
        };

        if !is_transient(&err) {
            return Err(TransportError::accept_failed(err, attempts));
        }

        let retries = attempts - 1;
        if policy.max_retries.is_some_and(|max| retries >= max) {
            return Err(TransportError::accept_failed(err, attempts));
        }

        let delay = backoff.next_delay();
        warn!(attempts, ?delay, error = %err, "accept failed; retrying");
        sleep(delay).await;
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Backoff -----------------------------------------------------

#[derive(Debug)]
struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------
