//! Bounded retry with capped exponential backoff and jitter.
//!
//! [`retry_with_backoff`] is a plain higher-order function: the operation,
//! the transient-error classifier and the sleeper are all passed in, so
//! tests run the full schedule without waiting.

use std::fmt::Display;
use std::time::Duration;

use rand::Rng;

use leadsync_core::Sleeper;

/// Retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay, jitter included.
    pub max_delay: Duration,
    /// Largest random amount added to a delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Same schedule without randomness.
    pub fn without_jitter(self) -> Self {
        Self {
            max_jitter: Duration::ZERO,
            ..self
        }
    }

    /// Delay before retry number `retry` (1-based), with `jitter_fraction`
    /// in `[0, 1]` selecting how much of `max_jitter` to add.
    pub fn delay_for(&self, retry: u32, jitter_fraction: f64) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let base = self
            .initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        let jitter = self.max_jitter.mul_f64(jitter_fraction.clamp(0.0, 1.0));
        (base + jitter).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// Only errors for which `is_transient` returns true are retried; anything
/// else is returned immediately. The last transient error is returned once
/// `policy.max_attempts` is exhausted.
pub fn retry_with_backoff<T, E, F, C>(
    policy: &RetryPolicy,
    operation: &str,
    sleeper: &dyn Sleeper,
    is_transient: C,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < max_attempts && is_transient(&err) => {
                let delay = policy.delay_for(attempt, rand::thread_rng().gen_range(0.0..=1.0));
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, retrying after backoff",
                );
                sleeper.sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    tracing::error!(operation, attempt, error = %err, "giving up");
                }
                return Err(err);
            }
        }
    }
}
