//! Layered configuration for the nostrap bootstrap tool.
//!
//! Settings resolve in increasing precedence from built-in defaults, a TOML
//! configuration file (`--config-path` or `NOSTRAP_CONFIG_PATH`), `NOSTRAP_*`
//! environment variables and finally command-line flags. Every field is
//! optional at load time; [`Config::resource_inputs`] enforces the inputs an
//! operation actually needs so a missing value is reported by name.

mod defaults;
mod logging;
mod store;

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT, default_store_dir};
pub use logging::{DEFAULT_LOG_FILTER, LogFormat, LogFormatParseError};
pub use store::{StoreBackend, StoreBackendParseError};

/// Resolved configuration shared by the CLI and its tests.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "NOSTRAP")]
pub struct Config {
    /// Base URL of the cluster control plane, for example `https://nomad.internal:4646`.
    pub address: Option<String>,
    /// Path prefix under which the credential fields are stored.
    pub ssm_prefix: Option<String>,
    /// Region of the secret store.
    pub aws_region: Option<String>,
    /// Secret store backend.
    pub store: Option<StoreBackend>,
    /// Directory used by the file-backed store.
    pub store_dir: Option<PathBuf>,
    /// Seconds between readiness probes and bootstrap attempts.
    pub poll_interval_secs: Option<u64>,
    /// Attempts allowed per polling loop; `0` or absent means unbounded.
    pub max_attempts: Option<u32>,
    /// Seconds a polling loop may run; `0` or absent means no deadline.
    pub deadline_secs: Option<u64>,
    /// Seconds allowed for a single HTTP exchange with the cluster.
    pub request_timeout_secs: Option<u64>,
    /// Tracing filter expression.
    pub log_filter: Option<String>,
    /// Log output format.
    pub log_format: Option<LogFormat>,
}

/// Required inputs of the managed credential resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInputs {
    /// Cluster base URL.
    pub address: String,
    /// Secret store path prefix.
    pub ssm_prefix: String,
    /// Secret store region.
    pub aws_region: String,
}

/// Polling knobs shared by the readiness and bootstrap loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Fixed pause between attempts.
    pub interval: Duration,
    /// Attempt budget, if bounded.
    pub max_attempts: Option<u32>,
    /// Wall-clock budget, if bounded.
    pub deadline: Option<Duration>,
}

/// Errors raised when the loaded configuration cannot drive an operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was absent or blank.
    #[error("missing required setting '{name}' (flag --{flag}, env NOSTRAP_{env})")]
    MissingSetting {
        /// Setting name as it appears in configuration files.
        name: &'static str,
        /// Command-line flag spelling.
        flag: &'static str,
        /// Environment variable suffix.
        env: &'static str,
    },
    /// The polling interval was configured as zero.
    #[error("poll interval must be at least one second")]
    ZeroInterval,
}

impl Config {
    /// Validates and returns the inputs every lifecycle operation needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] naming the first absent or
    /// blank input.
    pub fn resource_inputs(&self) -> Result<ResourceInputs, ConfigError> {
        Ok(ResourceInputs {
            address: required(self.address.as_deref(), "address", "address", "ADDRESS")?,
            ssm_prefix: required(
                self.ssm_prefix.as_deref(),
                "ssm_prefix",
                "ssm-prefix",
                "SSM_PREFIX",
            )?,
            aws_region: required(
                self.aws_region.as_deref(),
                "aws_region",
                "aws-region",
                "AWS_REGION",
            )?,
        })
    }

    /// Returns the polling settings with defaults applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroInterval`] when the interval is zero.
    pub fn retry_settings(&self) -> Result<RetrySettings, ConfigError> {
        let interval = match self.poll_interval_secs {
            Some(0) => return Err(ConfigError::ZeroInterval),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_POLL_INTERVAL,
        };
        Ok(RetrySettings {
            interval,
            max_attempts: self.max_attempts.filter(|attempts| *attempts > 0),
            deadline: self
                .deadline_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }

    /// Timeout applied to each HTTP exchange with the cluster.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs)
    }

    /// Selected secret store backend.
    #[must_use]
    pub fn store_backend(&self) -> StoreBackend {
        self.store.unwrap_or_default()
    }

    /// Directory used by the file-backed store.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(default_store_dir)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_default()
    }
}

fn required(
    value: Option<&str>,
    name: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_owned()),
        _ => Err(ConfigError::MissingSetting { name, flag, env }),
    }
}
