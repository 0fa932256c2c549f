//! Process-local secret store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{SecretStore, StoreError, StoreFactory};

#[derive(Debug, Default)]
struct Entries {
    values: BTreeMap<String, String>,
    writes: Vec<String>,
}

/// Secret store holding values in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<Entries>,
}

impl MemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value without recording it as a write.
    pub fn insert(&self, path: &str, value: &str) {
        self.lock().values.insert(path.to_owned(), value.to_owned());
    }

    /// Current value at `path`.
    #[must_use]
    pub fn value(&self, path: &str) -> Option<String> {
        self.lock().values.get(path).cloned()
    }

    /// Paths written through [`SecretStore::put_secure`], in order.
    #[must_use]
    pub fn write_log(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretStore for MemorySecretStore {
    fn put_secure(&self, path: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock();
        entries.values.insert(path.to_owned(), value.to_owned());
        entries.writes.push(path.to_owned());
        Ok(())
    }

    fn get_decrypted(&self, path: &str) -> Result<String, StoreError> {
        self.value(path).ok_or_else(|| StoreError::NotFound {
            path: path.to_owned(),
        })
    }
}

/// Factory keeping one [`MemorySecretStore`] per region.
///
/// Connecting twice to the same region yields views over the same values.
#[derive(Debug, Default)]
pub struct MemoryStoreFactory {
    regions: Mutex<BTreeMap<String, Arc<MemorySecretStore>>>,
}

impl MemoryStoreFactory {
    /// Creates a factory with no regions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backing `region`, creating it when absent.
    #[must_use]
    pub fn region(&self, region: &str) -> Arc<MemorySecretStore> {
        let mut regions = self.regions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(regions.entry(region.to_owned()).or_default())
    }

    /// Regions connected so far.
    #[must_use]
    pub fn regions(&self) -> Vec<String> {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, StoreError> {
        Ok(Box::new(self.region(region)))
    }
}
