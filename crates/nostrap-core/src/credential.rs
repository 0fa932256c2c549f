//! The management token minted by the bootstrap call.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

/// Decoded body of a successful bootstrap response.
///
/// `accessor_id` is the stable public identity; `secret_id` is the bearer
/// value and is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapCredential {
    /// Public token identifier.
    #[serde(rename = "AccessorID", default)]
    pub accessor_id: String,
    /// Bearer secret.
    #[serde(rename = "SecretID", default)]
    pub secret_id: String,
    /// Token name.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Token type, `management` for bootstrap tokens.
    #[serde(rename = "Type", default)]
    pub token_type: String,
    /// Attached policies; empty for management tokens.
    #[serde(rename = "Policies", default, deserialize_with = "string_or_list")]
    pub policies: Vec<String>,
    /// Whether the token is replicated across regions.
    #[serde(rename = "Global", default)]
    pub global: bool,
    /// Creation timestamp as reported by the cluster.
    #[serde(rename = "CreateTime", default)]
    pub create_time: String,
    /// Raft index at creation.
    #[serde(rename = "CreateIndex", default)]
    pub create_index: u64,
    /// Raft index of the last modification.
    #[serde(rename = "ModifyIndex", default)]
    pub modify_index: u64,
}

impl BootstrapCredential {
    /// Decodes and validates a bootstrap response body.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Decode`] for malformed JSON and
    /// [`CredentialError::MissingField`] when `AccessorID` or `SecretID` is
    /// absent or blank.
    pub fn from_json(body: &str) -> Result<Self, CredentialError> {
        let credential: Self = serde_json::from_str(body).map_err(|error| {
            CredentialError::Decode {
                message: error.to_string(),
            }
        })?;
        if credential.accessor_id.trim().is_empty() {
            return Err(CredentialError::MissingField { field: "AccessorID" });
        }
        if credential.secret_id.trim().is_empty() {
            return Err(CredentialError::MissingField { field: "SecretID" });
        }
        Ok(credential)
    }
}

impl fmt::Debug for BootstrapCredential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BootstrapCredential")
            .field("accessor_id", &self.accessor_id)
            .field("secret_id", &"<redacted>")
            .field("name", &self.name)
            .field("token_type", &self.token_type)
            .field("policies", &self.policies)
            .field("global", &self.global)
            .field("create_time", &self.create_time)
            .field("create_index", &self.create_index)
            .field("modify_index", &self.modify_index)
            .finish()
    }
}

/// Errors raised while decoding a bootstrap response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The body was not the expected JSON document.
    #[error("malformed bootstrap response: {message}")]
    Decode {
        /// Decoder diagnostic.
        message: String,
    },
    /// A required field was absent or blank.
    #[error("bootstrap response is missing {field}")]
    MissingField {
        /// Wire name of the field.
        field: &'static str,
    },
}

// Nomad reports `null` for management tokens; older clients modelled the
// field as a single string.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Policies {
        One(String),
        Many(Vec<String>),
    }

    match Option::<Policies>::deserialize(deserializer) {
        Ok(None) => Ok(Vec::new()),
        Ok(Some(Policies::One(policy))) if policy.is_empty() => Ok(Vec::new()),
        Ok(Some(Policies::One(policy))) => Ok(vec![policy]),
        Ok(Some(Policies::Many(policies))) => Ok(policies),
        Err(error) => Err(de::Error::custom(format!("invalid Policies: {error}"))),
    }
}
