//! Termination signal handling.
//!
//! A background thread waits for SIGTERM, SIGINT, SIGQUIT or SIGHUP and
//! cancels the shared token so polling loops stop at their next pause.

use std::io;
use std::thread::{self, JoinHandle};

use nostrap_core::CancellationToken;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tracing::{info, warn};

const SIGNALS_TARGET: &str = "nostrap::signals";

/// Keeps the signal thread alive; dropping it closes the iterator and joins.
pub(crate) struct SignalGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalGuard {
    pub(crate) fn install(cancel: CancellationToken) -> io::Result<Self> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name(String::from("nostrap-signals"))
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    info!(
                        target: SIGNALS_TARGET,
                        signal,
                        "termination signal received; cancelling"
                    );
                    cancel.cancel();
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: SIGNALS_TARGET, "signal thread panicked");
        }
    }
}
