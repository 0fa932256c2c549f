//! Structured progress reporting for lifecycle operations.

use std::fmt;
use std::sync::Arc;

use crate::resource::{ResourceError, ResourceSpec};

/// Lifecycle operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Bootstrap and persist a new token.
    Create,
    /// Refresh state from the store.
    Read,
    /// Refresh state; no field is updatable in place.
    Update,
    /// Forget the resource.
    Delete,
}

impl Operation {
    /// Lower-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Step of a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Parsing the cluster address.
    Resolving,
    /// Polling the cluster port.
    WaitingForReadiness,
    /// Calling the bootstrap endpoint.
    Bootstrapping,
    /// The cluster refused because bootstrap already happened.
    AlreadyBootstrapped,
    /// A credential was minted.
    Bootstrapped,
    /// Writing the credential to the store.
    PersistingCredential,
    /// Reading the credential from the store.
    ReadingCredential,
    /// Proving the credential against the cluster.
    Verifying,
    /// The operation finished.
    Done,
}

impl Phase {
    /// Snake-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::WaitingForReadiness => "waiting_for_readiness",
            Self::Bootstrapping => "bootstrapping",
            Self::AlreadyBootstrapped => "already_bootstrapped",
            Self::Bootstrapped => "bootstrapped",
            Self::PersistingCredential => "persisting_credential",
            Self::ReadingCredential => "reading_credential",
            Self::Verifying => "verifying",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Observer notified as lifecycle operations progress.
pub trait ProgressReporter: Send + Sync {
    /// Invoked before an operation starts.
    fn operation_started(&self, operation: Operation, spec: &ResourceSpec);

    /// Invoked on each phase transition.
    fn phase_entered(&self, operation: Operation, phase: Phase);

    /// Invoked when an operation completes; `accessor_id` is `None` when the
    /// resource is absent.
    fn operation_succeeded(&self, operation: Operation, accessor_id: Option<&str>);

    /// Invoked when an operation fails.
    fn operation_failed(&self, operation: Operation, error: &ResourceError);
}

impl<T> ProgressReporter for Arc<T>
where
    T: ProgressReporter + ?Sized,
{
    fn operation_started(&self, operation: Operation, spec: &ResourceSpec) {
        (**self).operation_started(operation, spec);
    }

    fn phase_entered(&self, operation: Operation, phase: Phase) {
        (**self).phase_entered(operation, phase);
    }

    fn operation_succeeded(&self, operation: Operation, accessor_id: Option<&str>) {
        (**self).operation_succeeded(operation, accessor_id);
    }

    fn operation_failed(&self, operation: Operation, error: &ResourceError) {
        (**self).operation_failed(operation, error);
    }
}

/// Default reporter that records progress using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredProgressReporter;

impl StructuredProgressReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for StructuredProgressReporter {
    fn operation_started(&self, operation: Operation, spec: &ResourceSpec) {
        tracing::info!(
            target: "nostrap::progress",
            event = "operation_started",
            operation = %operation,
            address = %spec.address,
            ssm_prefix = %spec.ssm_prefix,
            aws_region = %spec.aws_region,
            "starting operation"
        );
    }

    fn phase_entered(&self, operation: Operation, phase: Phase) {
        tracing::info!(
            target: "nostrap::progress",
            event = "phase_entered",
            operation = %operation,
            phase = %phase,
            "entering phase"
        );
    }

    fn operation_succeeded(&self, operation: Operation, accessor_id: Option<&str>) {
        tracing::info!(
            target: "nostrap::progress",
            event = "operation_succeeded",
            operation = %operation,
            accessor_id = accessor_id.unwrap_or("<absent>"),
            "operation completed"
        );
    }

    fn operation_failed(&self, operation: Operation, error: &ResourceError) {
        tracing::error!(
            target: "nostrap::progress",
            event = "operation_failed",
            operation = %operation,
            error = %error,
            "operation failed"
        );
    }
}
