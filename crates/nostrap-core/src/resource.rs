//! Lifecycle of the bootstrap ACL token as a managed resource.
//!
//! `create` waits for the cluster, bootstraps it, persists the credential,
//! and finishes with a full `read`. `read` and `update` load the credential
//! from the store and prove it against the cluster. `delete` only forgets the
//! resource: the stored secret is owned by the store.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::bootstrap::{BootstrapError, bootstrap_acl};
use crate::cluster::{ClusterClient, TransportError};
use crate::endpoint::{ClusterEndpoint, EndpointError};
use crate::progress::{Operation, Phase, ProgressReporter, StructuredProgressReporter};
use crate::readiness::{ConnectionProbe, ReadinessError, TcpProbe, wait_until_ready};
use crate::retry::Poller;
use crate::store::{CredentialStore, SecretStore, StoreError, StoreFactory};
use crate::verify::{VerifyError, verify_credential};

/// Inputs of the managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSpec {
    /// Cluster base URL. Changing it requires a new resource.
    pub address: String,
    /// Store prefix under which the credential is kept.
    pub ssm_prefix: String,
    /// Region of the secret store.
    pub aws_region: String,
}

impl ResourceSpec {
    /// Builds a spec from its three inputs.
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        ssm_prefix: impl Into<String>,
        aws_region: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            ssm_prefix: ssm_prefix.into(),
            aws_region: aws_region.into(),
        }
    }
}

/// Computed outputs of the managed resource.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    /// Resource identifier; equal to the accessor id.
    pub id: String,
    /// Public token identifier.
    pub accessor_id: String,
    /// Bearer secret.
    pub secret_id: String,
}

impl ResourceState {
    fn new(accessor_id: String, secret_id: String) -> Self {
        Self {
            id: accessor_id.clone(),
            accessor_id,
            secret_id,
        }
    }
}

impl fmt::Debug for ResourceState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResourceState")
            .field("id", &self.id)
            .field("accessor_id", &self.accessor_id)
            .field("secret_id", &"<redacted>")
            .finish()
    }
}

/// Result of a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The credential is stored and usable.
    Present(ResourceState),
    /// No complete credential is stored.
    Absent,
}

impl ReadOutcome {
    /// State when present.
    #[must_use]
    pub const fn state(&self) -> Option<&ResourceState> {
        match self {
            Self::Present(state) => Some(state),
            Self::Absent => None,
        }
    }
}

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The address is not a usable cluster URL.
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),
    /// The cluster never accepted connections.
    #[error(transparent)]
    NotReady(#[from] ReadinessError),
    /// The cluster was bootstrapped earlier; its token cannot be minted again.
    #[error("cluster at {address} is already bootstrapped; import the existing token instead")]
    AlreadyBootstrapped {
        /// Cluster address.
        address: String,
    },
    /// Bootstrap failed for another reason.
    #[error(transparent)]
    Bootstrap(BootstrapError),
    /// The cluster was bootstrapped but the credential could not be stored.
    #[error(
        "cluster bootstrapped (accessor {accessor_id}) but the credential could not be stored; \
         recover the token manually: {source}"
    )]
    Persist {
        /// Accessor of the minted token.
        accessor_id: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// The store could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The stored token was rejected by the cluster.
    #[error(
        "stored token {accessor_id} was rejected with status {status}: \
         the token is invalid or the cluster is unhealthy"
    )]
    CredentialUnusable {
        /// Accessor of the stored token.
        accessor_id: String,
        /// Status returned by the cluster.
        status: u16,
    },
    /// A request to the cluster failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// `create` persisted a credential that could not be read back.
    #[error("credential written under {ssm_prefix} could not be read back")]
    MissingAfterCreate {
        /// Prefix that was written.
        ssm_prefix: String,
    },
}

impl ResourceError {
    fn from_bootstrap(address: &str, error: BootstrapError) -> Self {
        match error {
            BootstrapError::AlreadyBootstrapped { .. } => Self::AlreadyBootstrapped {
                address: address.to_owned(),
            },
            BootstrapError::Transport(source) => Self::Transport(source),
            other => Self::Bootstrap(other),
        }
    }

    fn from_verify(accessor_id: &str, error: VerifyError) -> Self {
        match error {
            VerifyError::CredentialUnusable { status } => Self::CredentialUnusable {
                accessor_id: accessor_id.to_owned(),
                status,
            },
            VerifyError::Transport(source) => Self::Transport(source),
        }
    }
}

/// The bootstrap ACL token of one cluster.
pub struct AclTokenResource<C, F> {
    client: C,
    stores: F,
    probe: Arc<dyn ConnectionProbe>,
    poller: Poller,
    reporter: Arc<dyn ProgressReporter>,
}

impl<C, F> fmt::Debug for AclTokenResource<C, F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AclTokenResource")
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl<C, F> AclTokenResource<C, F>
where
    C: ClusterClient,
    F: StoreFactory,
{
    /// Builds a resource with a TCP probe, the default poller, and
    /// `tracing`-backed progress reporting.
    #[must_use]
    pub fn new(client: C, stores: F) -> Self {
        Self {
            client,
            stores,
            probe: Arc::new(TcpProbe::default()),
            poller: Poller::default(),
            reporter: Arc::new(StructuredProgressReporter::new()),
        }
    }

    /// Replaces the readiness probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn ConnectionProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replaces the poller driving readiness and bootstrap loops.
    #[must_use]
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// Replaces the progress reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Bootstraps the cluster and stores the minted credential.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::AlreadyBootstrapped`] when the cluster has
    /// been bootstrapped before, [`ResourceError::Persist`] when the token
    /// was minted but not stored, and the other variants as the individual
    /// steps fail.
    pub fn create(&self, spec: &ResourceSpec) -> Result<ResourceState, ResourceError> {
        self.observe(
            Operation::Create,
            spec,
            |state: &ResourceState| Some(state.accessor_id.as_str()),
            || self.create_inner(spec),
        )
    }

    /// Loads and verifies the stored credential.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CredentialUnusable`] when the cluster rejects
    /// the stored token, and store or transport failures as they occur. A
    /// missing credential is [`ReadOutcome::Absent`], not an error.
    pub fn read(&self, spec: &ResourceSpec) -> Result<ReadOutcome, ResourceError> {
        self.refresh(Operation::Read, spec)
    }

    /// Refreshes state. No field can change in place.
    ///
    /// # Errors
    ///
    /// As [`AclTokenResource::read`].
    pub fn update(&self, spec: &ResourceSpec) -> Result<ReadOutcome, ResourceError> {
        self.refresh(Operation::Update, spec)
    }

    /// Forgets the resource. The store and the cluster are left untouched.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other operations.
    pub fn delete(&self, spec: &ResourceSpec) -> Result<(), ResourceError> {
        self.observe(Operation::Delete, spec, |_: &()| None, || {
            self.reporter.phase_entered(Operation::Delete, Phase::Done);
            Ok(())
        })
    }

    fn refresh(
        &self,
        operation: Operation,
        spec: &ResourceSpec,
    ) -> Result<ReadOutcome, ResourceError> {
        self.observe(
            operation,
            spec,
            |outcome: &ReadOutcome| outcome.state().map(|state| state.accessor_id.as_str()),
            || {
                self.reporter.phase_entered(operation, Phase::Resolving);
                let endpoint = ClusterEndpoint::parse(&spec.address)?;
                let store = self.stores.connect(&spec.aws_region)?;
                let outcome = self.read_from(operation, &endpoint, &*store, &spec.ssm_prefix)?;
                self.reporter.phase_entered(operation, Phase::Done);
                Ok(outcome)
            },
        )
    }

    fn create_inner(&self, spec: &ResourceSpec) -> Result<ResourceState, ResourceError> {
        let operation = Operation::Create;
        self.reporter.phase_entered(operation, Phase::Resolving);
        let endpoint = ClusterEndpoint::parse(&spec.address)?;
        // Connect before bootstrapping: a minted token must have somewhere to go.
        let store = self.stores.connect(&spec.aws_region)?;

        self.reporter.phase_entered(operation, Phase::WaitingForReadiness);
        wait_until_ready(&*self.probe, endpoint.dial_target(), &self.poller)?;

        self.reporter.phase_entered(operation, Phase::Bootstrapping);
        let credential = match bootstrap_acl(&self.client, &endpoint, &self.poller) {
            Ok(credential) => credential,
            Err(error) => {
                if matches!(error, BootstrapError::AlreadyBootstrapped { .. }) {
                    self.reporter.phase_entered(operation, Phase::AlreadyBootstrapped);
                }
                return Err(ResourceError::from_bootstrap(&spec.address, error));
            }
        };
        self.reporter.phase_entered(operation, Phase::Bootstrapped);

        self.reporter.phase_entered(operation, Phase::PersistingCredential);
        CredentialStore::new(&*store, &spec.ssm_prefix)
            .write(&credential)
            .map_err(|source| ResourceError::Persist {
                accessor_id: credential.accessor_id.clone(),
                source,
            })?;

        let outcome = self.read_from(operation, &endpoint, &*store, &spec.ssm_prefix)?;
        self.reporter.phase_entered(operation, Phase::Done);
        match outcome {
            ReadOutcome::Present(state) => Ok(state),
            ReadOutcome::Absent => Err(ResourceError::MissingAfterCreate {
                ssm_prefix: spec.ssm_prefix.clone(),
            }),
        }
    }

    fn read_from(
        &self,
        operation: Operation,
        endpoint: &ClusterEndpoint,
        store: &dyn SecretStore,
        prefix: &str,
    ) -> Result<ReadOutcome, ResourceError> {
        self.reporter.phase_entered(operation, Phase::ReadingCredential);
        let Some(stored) = CredentialStore::new(store, prefix).read()? else {
            return Ok(ReadOutcome::Absent);
        };

        self.reporter.phase_entered(operation, Phase::Verifying);
        verify_credential(&self.client, endpoint, &stored.secret_id)
            .map_err(|error| ResourceError::from_verify(&stored.accessor_id, error))?;
        Ok(ReadOutcome::Present(ResourceState::new(
            stored.accessor_id,
            stored.secret_id,
        )))
    }

    fn observe<T>(
        &self,
        operation: Operation,
        spec: &ResourceSpec,
        accessor: impl Fn(&T) -> Option<&str>,
        run: impl FnOnce() -> Result<T, ResourceError>,
    ) -> Result<T, ResourceError> {
        self.reporter.operation_started(operation, spec);
        match run() {
            Ok(value) => {
                self.reporter.operation_succeeded(operation, accessor(&value));
                Ok(value)
            }
            Err(error) => {
                self.reporter.operation_failed(operation, &error);
                Err(error)
            }
        }
    }
}
