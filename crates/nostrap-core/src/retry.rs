//! Fixed-interval polling with cancellation.
//!
//! Both the readiness wait and the bootstrap call loop through a [`Poller`].
//! The interval never grows and carries no jitter. With the default
//! [`RetryPolicy`] the loop is unbounded; callers bound it with an attempt
//! budget, a deadline, or by cancelling the shared [`CancellationToken`].
//! [`Sleeper`] and [`Clock`] are injected so tests run without real sleeps.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

/// Pause between attempts unless configured otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Budget applied to a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_attempts: Option<u32>,
    deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(DEFAULT_INTERVAL)
    }
}

impl RetryPolicy {
    /// Retries forever with the given interval.
    #[must_use]
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    /// Caps the number of attempts. One attempt is always made.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Stops retrying once `deadline` has elapsed since the first attempt.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Attempt budget, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Wall-clock budget, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Returns `true` when another attempt may follow `attempts` failures.
    #[must_use]
    pub fn allows_another(&self, attempts: u32, elapsed: Duration) -> bool {
        let within_attempts = self.max_attempts.is_none_or(|limit| attempts < limit);
        let within_deadline = self
            .deadline
            .is_none_or(|deadline| elapsed.saturating_add(self.interval) <= deadline);
        within_attempts && within_deadline
    }
}

/// Cooperative cancellation shared between a polling loop and its owner.
///
/// Clones observe the same flag. Cancelling wakes any [`ThreadSleeper`]
/// currently waiting on the token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers cancellation and wakes waiters.
    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        condvar.notify_all();
    }

    /// Returns `true` once [`CancellationToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for up to `timeout`, returning `true` if cancelled meanwhile.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Marker returned when a pause was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

/// Pauses a polling loop between attempts.
pub trait Sleeper: Send + Sync {
    /// Pauses for `duration` unless `cancel` fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the token was cancelled.
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted>;
}

/// Sleeper that blocks the current thread on the cancellation token.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
        if cancel.wait_timeout(duration) {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Monotonic time source used to enforce deadlines.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Classification of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The attempt succeeded.
    Done(T),
    /// The attempt failed transiently; try again after the interval.
    Retry(E),
    /// The attempt failed terminally; stop immediately.
    Abort(E),
}

/// Reasons a polling loop ended without success.
#[derive(Debug, PartialEq, Eq)]
pub enum PollError<E> {
    /// An attempt reported a terminal failure.
    Aborted(E),
    /// The policy budget ran out; carries the last transient failure.
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Failure reported by the final attempt.
        last: E,
    },
    /// The cancellation token fired.
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
    },
}

/// Runs attempts under a [`RetryPolicy`].
#[derive(Clone)]
pub struct Poller {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl fmt::Debug for Poller {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Poller")
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Poller {
    /// Builds a poller using real sleeps and the system clock.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(ThreadSleeper),
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Observes the given cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Policy in force.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Token observed between attempts.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Calls `attempt` until it succeeds, aborts, or the budget runs out.
    ///
    /// The closure receives the 1-based attempt number. Cancellation is
    /// checked before every attempt and interrupts the pause between them.
    ///
    /// # Errors
    ///
    /// Returns a [`PollError`] describing why the loop stopped.
    pub fn run<T, E, F>(&self, operation: &str, mut attempt: F) -> Result<T, PollError<E>>
    where
        E: fmt::Display,
        F: FnMut(u32) -> Attempt<T, E>,
    {
        let started = self.clock.now();
        let mut attempts = 0_u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled { attempts });
            }
            attempts = attempts.saturating_add(1);
            let failure = match attempt(attempts) {
                Attempt::Done(value) => return Ok(value),
                Attempt::Abort(error) => return Err(PollError::Aborted(error)),
                Attempt::Retry(error) => error,
            };
            let elapsed = self.clock.now().saturating_duration_since(started);
            if !self.policy.allows_another(attempts, elapsed) {
                return Err(PollError::Exhausted {
                    attempts,
                    last: failure,
                });
            }
            warn!(
                target: "nostrap::retry",
                operation,
                attempt = attempts,
                error = %failure,
                delay_ms = u64::try_from(self.policy.interval.as_millis()).unwrap_or(u64::MAX),
                "attempt failed, retrying"
            );
            if self.sleeper.sleep(self.policy.interval, &self.cancel).is_err() {
                return Err(PollError::Cancelled { attempts });
            }
        }
    }
}
