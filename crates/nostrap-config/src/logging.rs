//! Log output settings shared by the binaries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Log filter applied when none is configured.
///
/// Keeps nostrap's own targets at `info` and quiets the HTTP and AWS stacks.
pub const DEFAULT_LOG_FILTER: &str = "warn,nostrap=info";

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
