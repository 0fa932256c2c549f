//! Error types and exit-code mapping for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use nostrap_config::{ConfigError, StoreBackend};
use nostrap_core::{ResourceError, TransportError};

use crate::telemetry::TelemetryError;

/// Exit code for a failed lifecycle operation.
pub(crate) const EXIT_FAILURE: u8 = 1;
/// Exit code for invalid arguments or configuration.
pub(crate) const EXIT_USAGE: u8 = 2;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to build the cluster client: {0}")]
    Client(TransportError),
    #[error("the {backend} store backend is not compiled into this binary")]
    StoreUnavailable { backend: StoreBackend },
    #[error("failed to install signal handlers: {0}")]
    Signals(io::Error),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("failed to render resource state: {0}")]
    Render(serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(io::Error),
}

impl AppError {
    /// Usage and configuration problems exit with 2; everything else with 1.
    pub(crate) const fn exit_code(&self) -> u8 {
        match self {
            Self::LoadConfiguration(_)
            | Self::CliUsage(_)
            | Self::Config(_)
            | Self::StoreUnavailable { .. } => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}
