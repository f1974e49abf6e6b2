//! Bounded retry and polling.
//!
//! Every wait in the engine (per-call throttling retries, CloudFront
//! propagation, NAT gateway release, ENI detachment) goes through a
//! [`RetryPolicy`] so that no loop can block the run indefinitely. Delays
//! come from `backon` builders; the policy adds the hard deadline.

use backon::{BackoffBuilder, BlockingRetryable, ConstantBuilder, ExponentialBuilder};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{EngineResult, ErrorKind};

/// How the delay between attempts evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same interval between every attempt
    Fixed,
    /// Interval doubles after each attempt, capped at `max`
    Exponential { max: Duration },
}

/// Bounded retry policy: attempts, spacing and a hard deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            timeout,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval: initial,
            timeout,
            backoff: Backoff::Exponential { max },
        }
    }

    /// A policy that never sleeps; used by tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO, Duration::from_secs(3600))
    }

    /// Retries allowed after the first attempt
    fn max_retries(&self) -> usize {
        self.max_attempts.saturating_sub(1) as usize
    }

    fn constant(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.interval)
            .with_max_times(self.max_retries())
    }

    fn exponential_builder(&self, max: Duration) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.interval)
            .with_max_delay(max)
            .with_factor(2.0)
            .with_max_times(self.max_retries())
    }

    /// Delays between attempts, one per retry
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match self.backoff {
            Backoff::Fixed => Box::new(self.constant().build()),
            Backoff::Exponential { max } => Box::new(self.exponential_builder(max).build()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(
            5,
            Duration::from_secs(1),
            Duration::from_secs(16),
            Duration::from_secs(60),
        )
    }
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Ready(T),
    Pending(String),
}

/// Retry `op` while it fails with a transient error.
///
/// Non-transient errors are returned immediately. When attempts or time run
/// out the last transient error is returned unchanged.
pub fn retry_transient<T, F>(policy: &RetryPolicy, op: F) -> EngineResult<T>
where
    F: FnMut() -> EngineResult<T>,
{
    match policy.backoff {
        Backoff::Fixed => retry_with(policy, policy.constant(), op),
        Backoff::Exponential { max } => retry_with(policy, policy.exponential_builder(max), op),
    }
}

fn retry_with<B, T, F>(policy: &RetryPolicy, builder: B, op: F) -> EngineResult<T>
where
    B: BackoffBuilder,
    F: FnMut() -> EngineResult<T>,
{
    let start = Instant::now();
    let timeout = policy.timeout;
    op.retry(builder)
        .sleep(move |delay: Duration| sleep_until_deadline(delay, start, timeout))
        .when(|err: &ErrorKind| err.is_transient() && start.elapsed() < timeout)
        .call()
}

/// Poll `check` until it reports ready.
///
/// `check` receives the 1-based attempt number. Transient errors count as a
/// pending attempt; any other error aborts the wait. Exhausting attempts or
/// the deadline yields [`ErrorKind::Timeout`].
pub fn poll_until<T, F>(policy: &RetryPolicy, waiting_for: &str, mut check: F) -> EngineResult<T>
where
    F: FnMut(u32) -> EngineResult<PollStatus<T>>,
{
    let start = Instant::now();
    let mut delays = policy.delays();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match check(attempt) {
            Ok(PollStatus::Ready(value)) => return Ok(value),
            Ok(PollStatus::Pending(_)) => {}
            Err(err) if err.is_transient() => {}
            Err(err) => return Err(err),
        }

        match delays.next() {
            Some(delay) if start.elapsed() < policy.timeout => {
                sleep_until_deadline(delay, start, policy.timeout)
            }
            _ => {
                return Err(ErrorKind::Timeout {
                    waiting_for: waiting_for.to_string(),
                    waited: start.elapsed(),
                });
            }
        }
    }
}

/// Sleep for `delay`, never past the deadline
fn sleep_until_deadline(delay: Duration, start: Instant, timeout: Duration) {
    let delay = delay.min(timeout.saturating_sub(start.elapsed()));
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}
