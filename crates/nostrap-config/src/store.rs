//! Secret store backend selection.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Backend used to persist the bootstrap credential.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StoreBackend {
    /// AWS Systems Manager Parameter Store, `SecureString` parameters.
    #[default]
    Ssm,
    /// Owner-only files beneath a local directory.
    File,
    /// Process memory; nothing survives the invocation.
    Memory,
}

/// Errors encountered while parsing a [`StoreBackend`] from text.
pub type StoreBackendParseError = strum::ParseError;
