//! Proves a stored token still authorises requests.

use thiserror::Error;
use tracing::{debug, warn};

use crate::cluster::{ClusterClient, TransportError};
use crate::endpoint::ClusterEndpoint;

/// Errors raised by [`verify_credential`].
#[derive(Debug, Error, Clone)]
pub enum VerifyError {
    /// The cluster answered with a non-200 status.
    #[error(
        "node listing returned status {status}: the token is invalid or the cluster is unhealthy"
    )]
    CredentialUnusable {
        /// Status returned by the cluster.
        status: u16,
    },
    /// The request never completed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Lists nodes using `secret` as the ACL token. One attempt, no retries.
///
/// # Errors
///
/// Returns [`VerifyError::CredentialUnusable`] for any non-200 status and
/// [`VerifyError::Transport`] when the request fails.
pub fn verify_credential<C>(
    client: &C,
    endpoint: &ClusterEndpoint,
    secret: &str,
) -> Result<(), VerifyError>
where
    C: ClusterClient + ?Sized,
{
    let response = client.list_nodes(endpoint, secret)?;
    if response.is_ok() {
        debug!(target: "nostrap::verify", endpoint = %endpoint, "token accepted");
        return Ok(());
    }
    warn!(
        target: "nostrap::verify",
        endpoint = %endpoint,
        status = response.status,
        "token rejected"
    );
    Err(VerifyError::CredentialUnusable {
        status: response.status,
    })
}
