//! Scripted collaborators for lifecycle tests.

use std::collections::BTreeSet;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use mockall::mock;

use crate::cluster::{ClusterClient, ClusterResponse, TransportError};
use crate::endpoint::{ClusterEndpoint, DialTarget};
use crate::progress::{Operation, Phase, ProgressReporter};
use crate::readiness::ConnectionProbe;
use crate::resource::{ResourceError, ResourceSpec};
use crate::store::{MemorySecretStore, SecretStore, StoreError, StoreFactory};

mock! {
    pub Cluster {}
    impl ClusterClient for Cluster {
        fn bootstrap(&self, endpoint: &ClusterEndpoint) -> Result<ClusterResponse, TransportError>;
        fn list_nodes(
            &self,
            endpoint: &ClusterEndpoint,
            token: &str,
        ) -> Result<ClusterResponse, TransportError>;
    }
}

/// Probe refusing a fixed number of connections before accepting.
#[derive(Debug, Default)]
pub(crate) struct ScriptedProbe {
    refusals: u32,
    targets: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub(crate) fn refusing(refusals: u32) -> Self {
        Self {
            refusals,
            targets: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn attempts(&self) -> u32 {
        u32::try_from(self.targets().len()).unwrap_or(u32::MAX)
    }

    pub(crate) fn targets(&self) -> Vec<String> {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConnectionProbe for ScriptedProbe {
    fn probe(&self, target: &DialTarget) -> io::Result<()> {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        targets.push(target.to_string());
        if u32::try_from(targets.len()).unwrap_or(u32::MAX) > self.refusals {
            Ok(())
        } else {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }
    }
}

/// In-memory store that fails writes or reads of chosen paths.
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemorySecretStore,
    failing_writes: Mutex<BTreeSet<String>>,
    failing_reads: Mutex<BTreeSet<String>>,
}

impl FailingStore {
    pub(crate) fn failing_on(path: &str) -> Self {
        let store = Self::default();
        store.reject_writes_to(path);
        store
    }

    pub(crate) fn unreadable(path: &str) -> Self {
        let store = Self::default();
        store
            .failing_reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_owned());
        store
    }

    pub(crate) fn reject_writes_to(&self, path: &str) {
        self.failing_writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_owned());
    }

    pub(crate) fn insert(&self, path: &str, value: &str) {
        self.inner.insert(path, value);
    }

    pub(crate) fn value(&self, path: &str) -> Option<String> {
        self.inner.value(path)
    }

    pub(crate) fn write_log(&self) -> Vec<String> {
        self.inner.write_log()
    }

    fn refuses(set: &Mutex<BTreeSet<String>>, path: &str) -> Result<(), StoreError> {
        if set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
        {
            return Err(StoreError::Backend {
                path: path.to_owned(),
                message: String::from("AccessDeniedException"),
            });
        }
        Ok(())
    }
}

impl SecretStore for FailingStore {
    fn put_secure(&self, path: &str, value: &str) -> Result<(), StoreError> {
        Self::refuses(&self.failing_writes, path)?;
        self.inner.put_secure(path, value)
    }

    fn get_decrypted(&self, path: &str) -> Result<String, StoreError> {
        Self::refuses(&self.failing_reads, path)?;
        self.inner.get_decrypted(path)
    }
}

/// Factory handing out the same store for every region.
#[derive(Debug)]
pub(crate) struct FixedStoreFactory<S> {
    store: Arc<S>,
    regions: Mutex<Vec<String>>,
}

impl<S> FixedStoreFactory<S> {
    pub(crate) fn new(store: Arc<S>) -> Self {
        Self {
            store,
            regions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn regions(&self) -> Vec<String> {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<S> StoreFactory for FixedStoreFactory<S>
where
    S: SecretStore + 'static,
{
    fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, StoreError> {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(region.to_owned());
        Ok(Box::new(Arc::clone(&self.store)))
    }
}

/// Reporter capturing phases and outcomes for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingProgressReporter {
    started: Mutex<Vec<Operation>>,
    phases: Mutex<Vec<Phase>>,
    outcomes: Mutex<Vec<String>>,
}

impl RecordingProgressReporter {
    pub(crate) fn started(&self) -> Vec<Operation> {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn phases(&self) -> Vec<Phase> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outcomes rendered as `operation:accessor`, `operation:absent`, or
    /// `operation:failed`.
    pub(crate) fn outcomes(&self) -> Vec<String> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push_outcome(&self, outcome: String) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }
}

impl ProgressReporter for RecordingProgressReporter {
    fn operation_started(&self, operation: Operation, _spec: &ResourceSpec) {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
    }

    fn phase_entered(&self, _operation: Operation, phase: Phase) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(phase);
    }

    fn operation_succeeded(&self, operation: Operation, accessor_id: Option<&str>) {
        self.push_outcome(format!("{operation}:{}", accessor_id.unwrap_or("absent")));
    }

    fn operation_failed(&self, operation: Operation, _error: &ResourceError) {
        self.push_outcome(format!("{operation}:failed"));
    }
}
