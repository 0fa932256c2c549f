//! Persistence of the bootstrap credential in an encrypted secret store.
//!
//! A credential is stored as two values under a shared prefix:
//! `<prefix>/secret_id` and `<prefix>/accessor_id`. The secret is written
//! first and the accessor last, so a present accessor implies the secret was
//! written too. Reads tolerate a half-written prefix and report it as absent.
//!
//! Backends implement [`SecretStore`]; a [`StoreFactory`] builds one for a
//! region so no client is shared across regions or invocations.

mod file;
mod memory;
#[cfg(feature = "ssm")]
mod ssm;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::credential::BootstrapCredential;

pub use file::{FileSecretStore, FileStoreFactory};
pub use memory::{MemorySecretStore, MemoryStoreFactory};
#[cfg(feature = "ssm")]
pub use ssm::{SsmParameterStore, SsmStoreFactory};

/// A field persisted for each credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    /// The public token identifier; written last.
    AccessorId,
    /// The bearer secret; written first.
    SecretId,
}

impl CredentialField {
    /// Order in which fields are written.
    pub const WRITE_ORDER: [Self; 2] = [Self::SecretId, Self::AccessorId];

    /// Key appended to the prefix.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::AccessorId => "accessor_id",
            Self::SecretId => "secret_id",
        }
    }

    /// Full store path of this field under `prefix`.
    #[must_use]
    pub fn path(self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_end_matches('/'), self.key())
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.key())
    }
}

/// Errors raised by secret stores.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// No value exists at the path.
    #[error("no secret stored at {path}")]
    NotFound {
        /// Path that was read.
        path: String,
    },
    /// The backend rejected the call.
    #[error("secret store failed for {path}: {message}")]
    Backend {
        /// Path that was accessed.
        path: String,
        /// Backend diagnostic.
        message: String,
    },
    /// A store for the region could not be built.
    #[error("failed to connect to the secret store in {region}: {message}")]
    Connect {
        /// Requested region.
        region: String,
        /// Backend diagnostic.
        message: String,
    },
    /// A credential write stopped after persisting some fields.
    #[error("credential partially written (stored: {}); writing {failed} failed: {source}", list_fields(.written))]
    PartialWrite {
        /// Fields persisted before the failure.
        written: Vec<CredentialField>,
        /// Field whose write failed.
        failed: CredentialField,
        /// Underlying failure.
        #[source]
        source: Box<StoreError>,
    },
}

fn list_fields(fields: &[CredentialField]) -> String {
    if fields.is_empty() {
        return String::from("none");
    }
    fields
        .iter()
        .map(|field| field.key())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A key/value secret backend.
pub trait SecretStore: Send + Sync {
    /// Stores `value` encrypted at `path`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the write fails.
    fn put_secure(&self, path: &str, value: &str) -> Result<(), StoreError>;

    /// Reads and decrypts the value at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored and
    /// [`StoreError::Backend`] for any other failure.
    fn get_decrypted(&self, path: &str) -> Result<String, StoreError>;
}

impl<T> SecretStore for Arc<T>
where
    T: SecretStore + ?Sized,
{
    fn put_secure(&self, path: &str, value: &str) -> Result<(), StoreError> {
        (**self).put_secure(path, value)
    }

    fn get_decrypted(&self, path: &str) -> Result<String, StoreError> {
        (**self).get_decrypted(path)
    }
}

/// Builds a [`SecretStore`] for a region.
pub trait StoreFactory: Send + Sync {
    /// Connects to the store serving `region`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] when the backend cannot be reached.
    fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, StoreError>;
}

impl<T> StoreFactory for Arc<T>
where
    T: StoreFactory + ?Sized,
{
    fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, StoreError> {
        (**self).connect(region)
    }
}

/// Credential pair read back from a store.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Public token identifier.
    pub accessor_id: String,
    /// Bearer secret.
    pub secret_id: String,
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StoredCredential")
            .field("accessor_id", &self.accessor_id)
            .field("secret_id", &"<redacted>")
            .finish()
    }
}

/// Reads and writes credentials under a prefix.
pub struct CredentialStore<'a> {
    store: &'a dyn SecretStore,
    prefix: &'a str,
}

impl<'a> CredentialStore<'a> {
    /// Wraps `store`, scoping paths under `prefix`.
    #[must_use]
    pub fn new(store: &'a dyn SecretStore, prefix: &'a str) -> Self {
        Self { store, prefix }
    }

    /// Writes the secret, then the accessor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PartialWrite`] naming the fields written before
    /// the first failure. Nothing is rolled back.
    pub fn write(&self, credential: &BootstrapCredential) -> Result<(), StoreError> {
        let mut written = Vec::with_capacity(CredentialField::WRITE_ORDER.len());
        for field in CredentialField::WRITE_ORDER {
            let value = match field {
                CredentialField::SecretId => credential.secret_id.as_str(),
                CredentialField::AccessorId => credential.accessor_id.as_str(),
            };
            let path = field.path(self.prefix);
            if let Err(source) = self.store.put_secure(&path, value) {
                warn!(
                    target: "nostrap::store",
                    path = %path,
                    written = %list_fields(&written),
                    error = %source,
                    "credential write interrupted"
                );
                return Err(StoreError::PartialWrite {
                    written,
                    failed: field,
                    source: Box::new(source),
                });
            }
            debug!(target: "nostrap::store", path = %path, "stored credential field");
            written.push(field);
        }
        Ok(())
    }

    /// Reads the accessor, then the secret.
    ///
    /// Returns `Ok(None)` when either field is missing.
    ///
    /// # Errors
    ///
    /// Returns backend failures other than not-found.
    pub fn read(&self) -> Result<Option<StoredCredential>, StoreError> {
        let Some(accessor_id) = self.read_field(CredentialField::AccessorId)? else {
            return Ok(None);
        };
        let Some(secret_id) = self.read_field(CredentialField::SecretId)? else {
            warn!(
                target: "nostrap::store",
                prefix = self.prefix,
                accessor_id = %accessor_id,
                "accessor stored without secret; treating credential as absent"
            );
            return Ok(None);
        };
        Ok(Some(StoredCredential {
            accessor_id,
            secret_id,
        }))
    }

    fn read_field(&self, field: CredentialField) -> Result<Option<String>, StoreError> {
        let path = field.path(self.prefix);
        match self.store.get_decrypted(&path) {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NotFound { .. }) => {
                debug!(target: "nostrap::store", path = %path, "credential field not found");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}
