//! Eventual-condition waiter
//!
//! Polls a predicate on a fixed interval until it is ready or an overall deadline passes.
//!
//! Semantics:
//! - The deadline is computed once, from the policy's clock, when the wait starts.
//! - The predicate is always invoked at least once; the deadline is checked after each attempt,
//!   never before.
//! - `Check::Ready(v)` returns `Ok(v)` immediately with no further sleep.
//! - `Check::Pending(reason)` sleeps `interval` and retries, unless the deadline has passed, in
//!   which case the wait returns `WaitError::NotReady` whose `Display` is `reason` verbatim.
//! - `Check::Failed(e)` returns `WaitError::Failed(e)` immediately; it is never retried.
//!
//! Invariants:
//! - With a zero timeout exactly one attempt is made and no sleep happens.
//! - Attempts never exceed `ceil(timeout / interval) + 1`.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use convergence::{Check, WaitPolicy, InstantSleeper};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = WaitPolicy::builder()
//!     .timeout(Duration::from_secs(1))
//!     .interval(Duration::from_millis(100))
//!     .with_sleeper(InstantSleeper)
//!     .build()
//!     .unwrap();
//!
//! let mut calls = 0;
//! let result = policy
//!     .execute(|| {
//!         calls += 1;
//!         let n = calls;
//!         async move {
//!             if n < 4 { Check::<u32, std::io::Error>::pending("not ready") } else { Check::Ready(42) }
//!         }
//!     })
//!     .await;
//! assert_eq!(result.unwrap(), 42);
//! # });
//! ```

use crate::clock::{Clock, MonotonicClock};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::{Check, WaitError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default overall deadline for a wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default pause between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed-interval polling policy with a hard deadline.
#[derive(Clone)]
pub struct WaitPolicy {
    timeout: Duration,
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WaitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitPolicy")
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .field("sleeper", &self.sleeper)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(MonotonicClock::default()),
        }
    }
}

impl WaitPolicy {
    /// Construct a new builder with defaults (5s timeout, 100ms interval).
    pub fn builder() -> WaitPolicyBuilder {
        WaitPolicyBuilder::new()
    }

    /// Policy with the given timeout and interval and production sleeper/clock.
    pub fn new(timeout: Duration, interval: Duration) -> Result<Self, BuildError> {
        Self::builder().timeout(timeout).interval(interval).build()
    }

    /// Policy from float seconds.
    ///
    /// A negative timeout is treated as zero: the predicate still runs once. The interval must be
    /// positive and both values finite.
    pub fn from_secs_f64(timeout: f64, interval: f64) -> Result<Self, BuildError> {
        let timeout = if timeout.is_finite() && timeout < 0.0 { 0.0 } else { timeout };
        let timeout = secs("timeout", timeout)?;
        let interval = secs("interval", interval)?;
        Self::new(timeout, interval)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on predicate invocations for one wait: `ceil(timeout / interval) + 1`.
    pub fn max_attempts(&self) -> usize {
        let (t, i) = (self.timeout.as_nanos(), self.interval.as_nanos());
        let polls = t.div_ceil(i);
        usize::try_from(polls).unwrap_or(usize::MAX).saturating_add(1)
    }

    /// Same policy with a different timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Poll an async predicate until it is ready, fails, or the deadline passes.
    pub async fn execute<T, E, Fut, Op>(&self, mut predicate: Op) -> Result<T, WaitError<E>>
    where
        Fut: Future<Output = Check<T, E>>,
        Op: FnMut() -> Fut,
    {
        let mut deadline = Deadline::start(self.clock.as_ref(), self.timeout);
        loop {
            let check = predicate().await;
            match deadline.observe(self.clock.as_ref(), check) {
                Next::Done(result) => return result,
                Next::Retry => self.sleeper.sleep(self.interval).await,
            }
        }
    }

    /// Poll a synchronous predicate, blocking the calling thread between attempts.
    pub fn execute_blocking<T, E, Op>(&self, mut predicate: Op) -> Result<T, WaitError<E>>
    where
        Op: FnMut() -> Check<T, E>,
    {
        let mut deadline = Deadline::start(self.clock.as_ref(), self.timeout);
        loop {
            match deadline.observe(self.clock.as_ref(), predicate()) {
                Next::Done(result) => return result,
                Next::Retry => self.sleeper.sleep_blocking(self.interval),
            }
        }
    }
}

/// Poll `predicate` with the default policy (5s timeout, 100ms interval).
pub async fn wait_for<T, E, Fut, Op>(predicate: Op) -> Result<T, WaitError<E>>
where
    Fut: Future<Output = Check<T, E>>,
    Op: FnMut() -> Fut,
{
    WaitPolicy::default().execute(predicate).await
}

/// Blocking variant of [`wait_for`].
pub fn wait_for_blocking<T, E, Op>(predicate: Op) -> Result<T, WaitError<E>>
where
    Op: FnMut() -> Check<T, E>,
{
    WaitPolicy::default().execute_blocking(predicate)
}

/// Per-wait bookkeeping: when the wait started, when it must stop, how many attempts so far.
struct Deadline {
    start: Duration,
    at: Duration,
    attempts: usize,
}

enum Next<T, E> {
    Done(Result<T, WaitError<E>>),
    Retry,
}

impl Deadline {
    fn start(clock: &dyn Clock, timeout: Duration) -> Self {
        let start = clock.now();
        Self { start, at: start.saturating_add(timeout), attempts: 0 }
    }

    fn observe<T, E>(&mut self, clock: &dyn Clock, check: Check<T, E>) -> Next<T, E> {
        self.attempts += 1;
        match check {
            Check::Ready(value) => Next::Done(Ok(value)),
            Check::Failed(e) => Next::Done(Err(WaitError::Failed(e))),
            Check::Pending(reason) => {
                let now = clock.now();
                if now >= self.at {
                    let elapsed = now.saturating_sub(self.start);
                    tracing::warn!(
                        attempts = self.attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        reason = %reason,
                        "condition not met before deadline"
                    );
                    Next::Done(Err(WaitError::NotReady { reason, attempts: self.attempts, elapsed }))
                } else {
                    tracing::debug!(attempt = self.attempts, reason = %reason, "condition pending");
                    Next::Retry
                }
            }
        }
    }
}

/// Errors produced while building a wait policy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// `interval` must be > 0.
    #[error("interval must be > 0 (got {0:?})")]
    InvalidInterval(Duration),
    /// A float-seconds value was NaN, infinite, or too large for a `Duration`.
    #[error("{field} must be a finite, representable number of seconds (got {value})")]
    InvalidSeconds { field: &'static str, value: f64 },
}

fn secs(field: &'static str, value: f64) -> Result<Duration, BuildError> {
    Duration::try_from_secs_f64(value).map_err(|_| BuildError::InvalidSeconds { field, value })
}

/// Builder for `WaitPolicy`.
pub struct WaitPolicyBuilder {
    timeout: Duration,
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
}

impl WaitPolicyBuilder {
    /// Create a builder with the default timeout and interval.
    pub fn new() -> Self {
        let WaitPolicy { timeout, interval, sleeper, clock } = WaitPolicy::default();
        Self { timeout, interval, sleeper, clock }
    }

    /// Overall deadline, measured from the start of each wait. Zero means "one attempt".
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pause between attempts. Must be > 0.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Provide a custom clock implementation.
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Build the wait policy, validating inputs.
    pub fn build(self) -> Result<WaitPolicy, BuildError> {
        if self.interval.is_zero() {
            return Err(BuildError::InvalidInterval(self.interval));
        }
        Ok(WaitPolicy {
            timeout: self.timeout,
            interval: self.interval,
            sleeper: self.sleeper,
            clock: self.clock,
        })
    }
}

impl Default for WaitPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InstantSleeper, ManualClock, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    fn simulated(timeout: Duration, interval: Duration) -> (WaitPolicy, TrackingSleeper) {
        let clock = ManualClock::new();
        let sleeper = TrackingSleeper::with_clock(clock.clone());
        let policy = WaitPolicy::builder()
            .timeout(timeout)
            .interval(interval)
            .with_sleeper(sleeper.clone())
            .with_clock(clock)
            .build()
            .expect("builder");
        (policy, sleeper)
    }

    #[tokio::test]
    async fn ready_first_attempt_never_sleeps() {
        let (policy, sleeper) = simulated(Duration::from_secs(1), Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute(|| {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Check::<_, TestError>::Ready(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "Should only execute once");
        assert_eq!(sleeper.calls(), 0);
    }

    #[tokio::test]
    async fn ready_after_three_pending_attempts() {
        let (policy, sleeper) = simulated(Duration::from_secs(1), Duration::from_millis(100));
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute(|| {
                let counter = counter_clone.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                        Check::<_, TestError>::pending("not ready")
                    } else {
                        Check::Ready(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.calls(), 3);
        assert_eq!(sleeper.total(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn exhaustion_reports_last_reason_verbatim() {
        let (policy, _sleeper) = simulated(Duration::from_millis(200), Duration::from_millis(100));
        let counter = AtomicUsize::new(0);

        let result = policy
            .execute(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Check::<(), TestError>::Pending(format!("attempt {}", n)) }
            })
            .await;

        let err = result.unwrap_err();
        // t=0, t=100, t=200 (deadline reached)
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.to_string(), "attempt 2");
        assert_eq!(err.elapsed(), Some(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn still_pending_scenario_stops_after_two_or_three_attempts() {
        let policy = WaitPolicy::from_secs_f64(0.2, 0.1).expect("policy");
        let counter = AtomicUsize::new(0);
        let start = std::time::Instant::now();

        let result = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Check::<(), TestError>::pending("still pending") }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "still pending");
        let attempts = counter.load(Ordering::SeqCst);
        assert!((2..=3).contains(&attempts), "got {} attempts", attempts);
        assert!(start.elapsed() < Duration::from_millis(300) + Duration::from_millis(200));
    }

    #[tokio::test]
    async fn zero_timeout_makes_exactly_one_attempt() {
        let (policy, sleeper) = simulated(Duration::ZERO, Duration::from_millis(100));
        let counter = AtomicUsize::new(0);

        let result = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Check::<(), TestError>::pending("nope") }
            })
            .await;

        assert_eq!(result.unwrap_err().reason(), Some("nope"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.calls(), 0);
    }

    #[tokio::test]
    async fn negative_float_timeout_is_one_attempt() {
        let policy = WaitPolicy::from_secs_f64(-3.0, 0.1).expect("policy");
        assert_eq!(policy.timeout(), Duration::ZERO);
        let counter = AtomicUsize::new(0);

        let result = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Check::<(), TestError>::pending("nope") }
            })
            .await;

        assert!(result.unwrap_err().is_not_ready());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_failure_is_not_retried() {
        let (policy, sleeper) = simulated(Duration::from_secs(5), Duration::from_millis(100));
        let counter = AtomicUsize::new(0);

        let result = policy
            .execute(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Check::<(), _>::Failed(TestError("forbidden".into())) }
            })
            .await;

        assert_eq!(result.unwrap_err().into_failed(), Some(TestError("forbidden".into())));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.calls(), 0);
    }

    #[tokio::test]
    async fn fatal_failure_after_pending_stops_immediately() {
        let (policy, _sleeper) = simulated(Duration::from_secs(5), Duration::from_millis(100));
        let counter = AtomicUsize::new(0);

        let result = policy
            .execute(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Check::<(), _>::pending("warming up")
                    } else {
                        Check::Failed(TestError("bad request".into()))
                    }
                }
            })
            .await;

        assert!(result.unwrap_err().is_failed());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn attempts_are_bounded_by_timeout_over_interval() {
        for (timeout_ms, interval_ms) in [(1000u64, 100u64), (250, 100), (1, 7), (999, 1000)] {
            let (policy, _sleeper) =
                simulated(Duration::from_millis(timeout_ms), Duration::from_millis(interval_ms));
            let bound = policy.max_attempts();
            assert_eq!(bound, ((timeout_ms + interval_ms - 1) / interval_ms) as usize + 1);

            let counter = AtomicUsize::new(0);
            let _ = policy
                .execute(|| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Check::<(), TestError>::pending("never") }
                })
                .await;
            let attempts = counter.load(Ordering::SeqCst);
            assert!(attempts >= 1 && attempts <= bound, "{} attempts, bound {}", attempts, bound);
        }
    }

    #[tokio::test]
    async fn real_time_success_elapsed_within_bounds() {
        let policy = WaitPolicy::new(Duration::from_secs(1), Duration::from_millis(20)).unwrap();
        let counter = AtomicUsize::new(0);
        let start = std::time::Instant::now();

        let result = policy
            .execute(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Check::<_, TestError>::pending("not yet")
                    } else {
                        Check::Ready(n)
                    }
                }
            })
            .await;

        let elapsed = start.elapsed();
        assert_eq!(result.unwrap(), 3);
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_secs(1) + Duration::from_millis(20));
    }

    #[test]
    fn blocking_wait_matches_async_semantics() {
        let clock = ManualClock::new();
        let sleeper = TrackingSleeper::with_clock(clock.clone());
        let policy = WaitPolicy::builder()
            .timeout(Duration::from_secs(1))
            .interval(Duration::from_millis(100))
            .with_sleeper(sleeper.clone())
            .with_clock(clock)
            .build()
            .expect("builder");

        let mut calls = 0;
        let result = policy.execute_blocking(|| {
            calls += 1;
            if calls <= 3 {
                Check::<_, TestError>::pending("not ready")
            } else {
                Check::Ready(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 4);
        assert_eq!(sleeper.calls(), 3);
    }

    #[test]
    fn blocking_wait_for_uses_defaults() {
        let result = wait_for_blocking(|| Check::<_, TestError>::Ready("up"));
        assert_eq!(result.unwrap(), "up");
    }

    #[tokio::test]
    async fn wait_for_uses_default_policy() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.timeout(), Duration::from_secs(5));
        assert_eq!(policy.interval(), Duration::from_millis(100));

        let result = wait_for(|| async { Check::<_, TestError>::Ready(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn builder_rejects_zero_interval() {
        let err = WaitPolicy::builder().interval(Duration::ZERO).build();
        assert!(matches!(err, Err(BuildError::InvalidInterval(d)) if d.is_zero()));
        assert!(WaitPolicy::from_secs_f64(1.0, -0.5).is_err());
    }

    #[test]
    fn from_secs_rejects_non_finite_values() {
        assert!(matches!(
            WaitPolicy::from_secs_f64(f64::NAN, 0.1),
            Err(BuildError::InvalidSeconds { field: "timeout", .. })
        ));
        assert!(matches!(
            WaitPolicy::from_secs_f64(1.0, f64::INFINITY),
            Err(BuildError::InvalidSeconds { field: "interval", .. })
        ));
    }

    #[tokio::test]
    async fn instant_sleeper_policy_with_huge_timeout_does_not_overflow() {
        let policy = WaitPolicy::builder()
            .timeout(Duration::MAX)
            .with_sleeper(InstantSleeper)
            .build()
            .expect("builder");
        let result = policy.execute(|| async { Check::<_, TestError>::Ready(()) }).await;
        assert!(result.is_ok());
    }
}
