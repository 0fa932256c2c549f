//! Deterministic time for polling loops.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::retry::{CancellationToken, Clock, Interrupted, Poller, RetryPolicy, Sleeper};

/// Clock that only moves when a sleeper advances it.
#[derive(Debug)]
pub(crate) struct FakeClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl FakeClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub(crate) fn advance(&self, duration: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += duration;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sleeper that records pauses and advances a [`FakeClock`] instead of
/// blocking.
#[derive(Debug)]
pub(crate) struct RecordingSleeper {
    clock: Arc<FakeClock>,
    pauses: Mutex<Vec<Duration>>,
    cancel_on_pause: Mutex<Option<CancellationToken>>,
}

impl RecordingSleeper {
    pub(crate) fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            pauses: Mutex::new(Vec::new()),
            cancel_on_pause: Mutex::new(None),
        }
    }

    /// Pauses requested so far.
    pub(crate) fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancels `token` during the next pause, as a signal handler would.
    pub(crate) fn cancel_on_pause(&self, token: CancellationToken) {
        *self
            .cancel_on_pause
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        if let Some(token) = self
            .cancel_on_pause
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        self.clock.advance(duration);
        Ok(())
    }
}

/// Builds a poller over a fake clock, returning the sleeper for inspection.
pub(crate) fn test_poller(policy: RetryPolicy) -> (Poller, Arc<RecordingSleeper>) {
    let clock = Arc::new(FakeClock::new());
    let sleeper = Arc::new(RecordingSleeper::new(Arc::clone(&clock)));
    let poller = Poller::new(policy)
        .with_sleeper(sleeper.clone())
        .with_clock(clock);
    (poller, sleeper)
}
