//! Waits for the control plane to accept TCP connections.
//!
//! Readiness only means the port is listening; the HTTP API may still be
//! initialising, which the bootstrap loop tolerates by retrying.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::endpoint::DialTarget;
use crate::retry::{Attempt, PollError, Poller};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens and immediately closes a connection to a dial target.
pub trait ConnectionProbe: Send + Sync {
    /// Attempts one connection.
    ///
    /// # Errors
    ///
    /// Returns the I/O error reported by the connection attempt.
    fn probe(&self, target: &DialTarget) -> io::Result<()>;
}

impl<T> ConnectionProbe for Arc<T>
where
    T: ConnectionProbe + ?Sized,
{
    fn probe(&self, target: &DialTarget) -> io::Result<()> {
        (**self).probe(target)
    }
}

/// Probe that dials every resolved address until one accepts.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

impl TcpProbe {
    /// Builds a probe with the given per-address connect timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ConnectionProbe for TcpProbe {
    fn probe(&self, target: &DialTarget) -> io::Result<()> {
        let mut last_error = None;
        for address in target.to_string().to_socket_addrs()? {
            match TcpStream::connect_timeout(&address, self.timeout) {
                Ok(stream) => {
                    drop(stream);
                    return Ok(());
                }
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address")
        }))
    }
}

/// Errors ending a readiness wait.
#[derive(Debug, Error, Clone)]
pub enum ReadinessError {
    /// The retry budget ran out before the target accepted a connection.
    #[error("{target} did not accept connections after {attempts} attempts: {source}")]
    Exhausted {
        /// Target that was probed.
        target: String,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: Arc<io::Error>,
    },
    /// The wait was cancelled.
    #[error("waiting for {target} was cancelled after {attempts} attempts")]
    Cancelled {
        /// Target that was probed.
        target: String,
        /// Attempts made.
        attempts: u32,
    },
}

/// Blocks until `target` accepts a TCP connection.
///
/// Each refused attempt is followed by one pause of the poller interval, so
/// `n` refusals followed by an accepted connection take `n + 1` probes.
/// Returns the number of probes made.
///
/// # Errors
///
/// Returns [`ReadinessError`] when the poller budget runs out or is
/// cancelled. With an unbounded, uncancelled poller this only returns once
/// the target is reachable.
pub fn wait_until_ready<P>(
    probe: &P,
    target: &DialTarget,
    poller: &Poller,
) -> Result<u32, ReadinessError>
where
    P: ConnectionProbe + ?Sized,
{
    let outcome = poller.run("wait_for_readiness", |attempt| {
        match probe.probe(target) {
            Ok(()) => Attempt::Done(attempt),
            Err(error) => {
                debug!(
                    target: "nostrap::readiness",
                    dial_target = %target,
                    attempt,
                    error = %error,
                    "cluster not accepting connections"
                );
                Attempt::Retry(error)
            }
        }
    });
    match outcome {
        Ok(attempts) => {
            info!(
                target: "nostrap::readiness",
                dial_target = %target,
                attempts,
                "cluster accepting connections"
            );
            Ok(attempts)
        }
        Err(PollError::Exhausted { attempts, last }) => Err(ReadinessError::Exhausted {
            target: target.to_string(),
            attempts,
            source: Arc::new(last),
        }),
        // Probe failures are always retried, so an abort carries the same
        // meaning as running out of budget.
        Err(PollError::Aborted(last)) => Err(ReadinessError::Exhausted {
            target: target.to_string(),
            attempts: 1,
            source: Arc::new(last),
        }),
        Err(PollError::Cancelled { attempts }) => Err(ReadinessError::Cancelled {
            target: target.to_string(),
            attempts,
        }),
    }
}
