//! One-time ACL bootstrap call.
//!
//! The cluster accepts the bootstrap exactly once. A response carrying
//! [`ALREADY_BOOTSTRAPPED_MARKER`] is terminal, as is a 200 whose body
//! cannot be read. Every other non-200 status and every transient transport
//! failure is retried on the poller interval.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::cluster::{BOOTSTRAP_PATH, ClusterClient, ClusterResponse, TransportError};
use crate::credential::{BootstrapCredential, CredentialError};
use crate::endpoint::ClusterEndpoint;
use crate::retry::{Attempt, PollError, Poller};

/// Body fragment the cluster returns once bootstrap has been consumed.
pub const ALREADY_BOOTSTRAPPED_MARKER: &str = "ACL bootstrap already done";

/// Errors ending a bootstrap attempt.
#[derive(Debug, Error, Clone)]
pub enum BootstrapError {
    /// The cluster reported that bootstrap already happened.
    #[error("ACL bootstrap already done for {url}; import the existing token instead")]
    AlreadyBootstrapped {
        /// Bootstrap URL.
        url: String,
    },
    /// A non-retryable transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The cluster answered 200, so a token was minted, but its body was lost.
    #[error(
        "cluster at {url} minted a token but the response body could not be read ({message}); \
         bootstrap cannot be repeated, recover the token manually"
    )]
    MintedButUnreadable {
        /// Bootstrap URL.
        url: String,
        /// Client diagnostic.
        message: String,
    },
    /// The 200 response could not be decoded into a credential.
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// The retry budget ran out.
    #[error("bootstrap did not succeed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Description of the final failure.
        last: String,
    },
    /// The loop was cancelled.
    #[error("bootstrap was cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts made.
        attempts: u32,
    },
}

#[derive(Debug)]
enum Failure {
    Status(u16, String),
    Transport(TransportError),
    Fatal(BootstrapError),
}

impl fmt::Display for Failure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status, body) => write!(formatter, "status {status}: {}", body.trim()),
            Self::Transport(error) => write!(formatter, "{error}"),
            Self::Fatal(error) => write!(formatter, "{error}"),
        }
    }
}

/// Calls the bootstrap endpoint until it yields a credential.
///
/// # Errors
///
/// Returns [`BootstrapError::AlreadyBootstrapped`] when the cluster has
/// already been bootstrapped, [`BootstrapError::Credential`] when a 200 body
/// is unusable, [`BootstrapError::MintedButUnreadable`] when a 200 body
/// cannot be read, [`BootstrapError::Transport`] for request construction
/// failures, and the exhaustion or cancellation variants when the poller
/// stops.
pub fn bootstrap_acl<C>(
    client: &C,
    endpoint: &ClusterEndpoint,
    poller: &Poller,
) -> Result<BootstrapCredential, BootstrapError>
where
    C: ClusterClient + ?Sized,
{
    let url = endpoint.api_url(BOOTSTRAP_PATH);
    let outcome = poller.run("bootstrap_acl", |attempt| match client.bootstrap(endpoint) {
        Ok(response) => classify_response(&url, attempt, response),
        Err(TransportError::Response {
            status: 200,
            message,
            ..
        }) => Attempt::Abort(Failure::Fatal(BootstrapError::MintedButUnreadable {
            url: url.clone(),
            message,
        })),
        Err(error) if error.is_transient() => Attempt::Retry(Failure::Transport(error)),
        Err(error) => Attempt::Abort(Failure::Fatal(BootstrapError::Transport(error))),
    });
    match outcome {
        Ok(credential) => {
            info!(
                target: "nostrap::bootstrap",
                url = %url,
                accessor_id = %credential.accessor_id,
                "cluster bootstrapped"
            );
            Ok(credential)
        }
        Err(PollError::Aborted(Failure::Fatal(error))) => Err(error),
        Err(PollError::Aborted(failure)) => Err(BootstrapError::Exhausted {
            attempts: 1,
            last: failure.to_string(),
        }),
        Err(PollError::Exhausted { attempts, last }) => Err(BootstrapError::Exhausted {
            attempts,
            last: last.to_string(),
        }),
        Err(PollError::Cancelled { attempts }) => Err(BootstrapError::Cancelled { attempts }),
    }
}

fn classify_response(
    url: &str,
    attempt: u32,
    response: ClusterResponse,
) -> Attempt<BootstrapCredential, Failure> {
    if response.is_ok() {
        return match BootstrapCredential::from_json(&response.body) {
            Ok(credential) => Attempt::Done(credential),
            Err(error) => Attempt::Abort(Failure::Fatal(error.into())),
        };
    }
    if response.body.contains(ALREADY_BOOTSTRAPPED_MARKER) {
        warn!(
            target: "nostrap::bootstrap",
            url,
            status = response.status,
            "cluster already bootstrapped"
        );
        return Attempt::Abort(Failure::Fatal(BootstrapError::AlreadyBootstrapped {
            url: url.to_owned(),
        }));
    }
    warn!(
        target: "nostrap::bootstrap",
        url,
        attempt,
        status = response.status,
        "bootstrap rejected"
    );
    Attempt::Retry(Failure::Status(response.status, response.body))
}
