//! Blocking `reqwest` implementation of [`ClusterClient`].

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::{
    BOOTSTRAP_PATH, ClusterClient, ClusterResponse, NODES_PATH, TOKEN_HEADER, TransportError,
};
use crate::endpoint::ClusterEndpoint;

/// Cluster client issuing real HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    client: Client,
}

impl HttpClusterClient {
    /// Builds a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] when the TLS backend or client
    /// cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|error| TransportError::Request {
                url: String::from("<client>"),
                message: error.to_string(),
            })?;
        Ok(Self { client })
    }

    fn execute(url: &str, request: RequestBuilder) -> Result<ClusterResponse, TransportError> {
        let response = request.send().map_err(|error| classify(url, &error))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().map_err(|error| TransportError::Response {
            url: url.to_owned(),
            status,
            message: error.to_string(),
        })?;
        debug!(
            target: "nostrap::cluster",
            url,
            status,
            body_len = bytes.len(),
            "cluster responded"
        );
        Ok(ClusterResponse::new(
            status,
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }
}

impl ClusterClient for HttpClusterClient {
    fn bootstrap(&self, endpoint: &ClusterEndpoint) -> Result<ClusterResponse, TransportError> {
        let url = endpoint.api_url(BOOTSTRAP_PATH);
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json");
        Self::execute(&url, request)
    }

    fn list_nodes(
        &self,
        endpoint: &ClusterEndpoint,
        token: &str,
    ) -> Result<ClusterResponse, TransportError> {
        let url = endpoint.api_url(NODES_PATH);
        let request = self.client.get(&url).header(TOKEN_HEADER, token);
        Self::execute(&url, request)
    }
}

/// Builder errors mean the request never left the process; everything else
/// happened on the wire.
fn classify(url: &str, error: &reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::Request {
            url: url.to_owned(),
            message: error.to_string(),
        }
    } else {
        TransportError::Exchange {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}
