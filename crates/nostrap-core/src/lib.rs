//! Bootstrap lifecycle for a Nomad cluster's initial ACL token.
//!
//! The flow is strictly sequential: resolve the cluster address, wait for
//! the control plane to accept TCP connections, call the one-time bootstrap
//! endpoint, persist the minted credential in an encrypted secret store, and
//! prove the stored token by listing nodes.
//!
//! [`AclTokenResource`] exposes that flow as create/read/update/delete
//! operations. Its collaborators sit behind traits so each step can be
//! exercised in isolation:
//!
//! - [`ClusterClient`] issues the HTTP calls ([`HttpClusterClient`] in
//!   production).
//! - [`ConnectionProbe`] performs the readiness check ([`TcpProbe`]).
//! - [`StoreFactory`] builds a [`SecretStore`] for a region.
//! - [`Poller`] drives the fixed-interval loops with an injected sleeper,
//!   clock, and cancellation token.
//! - [`ProgressReporter`] observes phase transitions.

mod bootstrap;
mod cluster;
mod credential;
mod endpoint;
mod progress;
mod readiness;
mod resource;
mod retry;
pub mod store;
mod verify;


pub use bootstrap::{ALREADY_BOOTSTRAPPED_MARKER, BootstrapError, bootstrap_acl};
pub use cluster::{
    BOOTSTRAP_PATH, ClusterClient, ClusterResponse, HttpClusterClient, NODES_PATH, TOKEN_HEADER,
    TransportError,
};
pub use credential::{BootstrapCredential, CredentialError};
pub use endpoint::{ClusterEndpoint, DialTarget, EndpointError};
pub use progress::{Operation, Phase, ProgressReporter, StructuredProgressReporter};
pub use readiness::{ConnectionProbe, ReadinessError, TcpProbe, wait_until_ready};
pub use resource::{AclTokenResource, ReadOutcome, ResourceError, ResourceSpec, ResourceState};
pub use retry::{
    Attempt, CancellationToken, Clock, DEFAULT_INTERVAL, Interrupted, PollError, Poller,
    RetryPolicy, Sleeper, SystemClock, ThreadSleeper,
};
pub use store::{SecretStore, StoreError, StoreFactory};
pub use verify::{VerifyError, verify_credential};
