use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dirs::data_local_dir;

/// Pause between readiness probes and between bootstrap attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on a single HTTP exchange with the cluster.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default directory for the file-backed secret store.
///
/// Resolves to `<data-local-dir>/nostrap/secrets`, falling back to the
/// temporary directory when the platform exposes no data directory.
#[must_use]
pub fn default_store_dir() -> PathBuf {
    let mut base = data_local_dir().unwrap_or_else(env::temp_dir);
    base.push("nostrap");
    base.push("secrets");
    base
}
