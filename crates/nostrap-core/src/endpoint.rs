//! Cluster address parsing.
//!
//! A [`ClusterEndpoint`] is built once per operation from the user-supplied
//! base URL. It keeps the normalised base for joining API paths and derives
//! the TCP [`DialTarget`] probed while waiting for readiness.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::{Host, Url};

/// Host and port dialled when probing the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialTarget {
    host: String,
    port: u16,
}

impl DialTarget {
    /// Builds a dial target. IPv6 literals must already carry brackets.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host component, bracketed for IPv6 literals.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port component.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for DialTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

/// Validated cluster base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    base: String,
    target: DialTarget,
}

impl ClusterEndpoint {
    /// Parses an absolute `http` or `https` URL.
    ///
    /// # Errors
    ///
    /// Returns an [`EndpointError`] when the input is not an absolute URL, the
    /// scheme is not `http`/`https`, the host is absent, or the address
    /// carries a query or fragment that API paths could not be joined after.
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(input.trim()).map_err(|source| EndpointError::Parse {
            input: input.to_owned(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(EndpointError::UnsupportedScheme {
                    input: input.to_owned(),
                    scheme: other.to_owned(),
                });
            }
        }
        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_owned(),
            Some(Host::Ipv4(address)) => address.to_string(),
            Some(Host::Ipv6(address)) => format!("[{address}]"),
            _ => {
                return Err(EndpointError::MissingHost {
                    input: input.to_owned(),
                });
            }
        };
        // `Url::port` hides ports equal to the scheme default, so an explicit
        // `:443` and an absent port resolve identically here.
        let port = url
            .port_or_known_default()
            .ok_or_else(|| EndpointError::MissingHost {
                input: input.to_owned(),
            })?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(EndpointError::QueryOrFragment {
                input: input.to_owned(),
            });
        }
        let base = url.as_str().trim_end_matches('/').to_owned();
        Ok(Self {
            base,
            target: DialTarget::new(host, port),
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// TCP target probed for readiness.
    #[must_use]
    pub const fn dial_target(&self) -> &DialTarget {
        &self.target
    }

    /// Joins an absolute API path such as `/v1/nodes` onto the base URL.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl FromStr for ClusterEndpoint {
    type Err = EndpointError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl fmt::Display for ClusterEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.base)
    }
}

/// Errors raised while parsing a cluster address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The input is not an absolute URL.
    #[error("invalid cluster address '{input}': {source}")]
    Parse {
        /// Address as supplied.
        input: String,
        /// Parser diagnostic.
        #[source]
        source: url::ParseError,
    },
    /// The scheme is neither `http` nor `https`.
    #[error("unsupported scheme '{scheme}' in cluster address '{input}'; expected http or https")]
    UnsupportedScheme {
        /// Address as supplied.
        input: String,
        /// Scheme found in the address.
        scheme: String,
    },
    /// The address has no host.
    #[error("cluster address '{input}' has no host")]
    MissingHost {
        /// Address as supplied.
        input: String,
    },
    /// The address carries a query string or fragment.
    #[error("cluster address '{input}' must not contain a query or fragment")]
    QueryOrFragment {
        /// Address as supplied.
        input: String,
    },
}
