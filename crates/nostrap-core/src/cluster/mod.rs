//! HTTP seam towards the Nomad control plane.
//!
//! [`ClusterClient`] exposes the two calls the bootstrap flow makes. The
//! production implementation is [`HttpClusterClient`]; tests substitute
//! scripted doubles so retry classification can be exercised without a
//! network.

mod http;

use std::sync::Arc;

use thiserror::Error;

use crate::endpoint::ClusterEndpoint;

pub use http::HttpClusterClient;

/// Path of the one-time ACL bootstrap call.
pub const BOOTSTRAP_PATH: &str = "/v1/acl/bootstrap";

/// Path of the node listing used to prove a token works.
pub const NODES_PATH: &str = "/v1/nodes";

/// Header carrying the ACL token.
pub const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Status line and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as UTF-8 (lossily).
    pub body: String,
}

impl ClusterResponse {
    /// Builds a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns `true` for status 200.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Failures that prevented an HTTP exchange from completing.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// The request could not be constructed or the client could not be built.
    #[error("failed to build request for {url}: {message}")]
    Request {
        /// Target URL.
        url: String,
        /// Client diagnostic.
        message: String,
    },
    /// The request was built but the exchange failed (connect, timeout, I/O).
    #[error("request to {url} failed: {message}")]
    Exchange {
        /// Target URL.
        url: String,
        /// Client diagnostic.
        message: String,
    },
    /// The status line arrived but the body could not be read.
    #[error("response from {url} (status {status}) could not be read: {message}")]
    Response {
        /// Target URL.
        url: String,
        /// Status the server sent before the body failed.
        status: u16,
        /// Client diagnostic.
        message: String,
    },
}

impl TransportError {
    /// Returns `true` when retrying the same request may succeed.
    ///
    /// A 200 whose body was lost is not transient: the server has already
    /// acted on the request.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } => false,
            Self::Exchange { .. } => true,
            Self::Response { status, .. } => *status != 200,
        }
    }
}

/// Calls made against the cluster.
pub trait ClusterClient {
    /// Issues the unauthenticated bootstrap `POST`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response was received.
    fn bootstrap(&self, endpoint: &ClusterEndpoint) -> Result<ClusterResponse, TransportError>;

    /// Lists nodes with the given secret as the ACL token.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response was received.
    fn list_nodes(
        &self,
        endpoint: &ClusterEndpoint,
        token: &str,
    ) -> Result<ClusterResponse, TransportError>;
}

impl<T> ClusterClient for Arc<T>
where
    T: ClusterClient + ?Sized,
{
    fn bootstrap(&self, endpoint: &ClusterEndpoint) -> Result<ClusterResponse, TransportError> {
        (**self).bootstrap(endpoint)
    }

    fn list_nodes(
        &self,
        endpoint: &ClusterEndpoint,
        token: &str,
    ) -> Result<ClusterResponse, TransportError> {
        (**self).list_nodes(endpoint, token)
    }
}
