//! Bounded retry with exponential backoff and jitter
//!
//! The delay before attempt `n + 1` is `min_backoff * 2^n`, capped at
//! `max_backoff`, then scaled by a random factor in
//! `[1 - random_factor, 1 + random_factor]`. Waits are raced against a
//! [`CancellationToken`], so shutdown never blocks on a sleeping retry.

use crate::error::RetryError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Default number of attempts, including the first one
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Default lower bound of the backoff
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(100);

/// Default upper bound of the backoff
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Default jitter factor
pub const DEFAULT_RANDOM_FACTOR: f64 = 0.5;

/// Errors that know whether another attempt may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry policy applied to transient per-step failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub random_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            random_factor: DEFAULT_RANDOM_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            ..Self::default()
        }
    }

    /// Policy with zero delays, for tests
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            random_factor: 0.0,
        }
    }

    /// Backoff before the attempt following the zero-based `attempt`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.min_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Backoff with jitter applied
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.random_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let spread: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
        let scale = 1.0 + self.random_factor * spread;
        if scale <= 0.0 {
            return self.min_backoff;
        }
        base.mul_f64(scale)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, runs out
/// of attempts or `cancel` fires.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let retryable = err.is_retryable();
        if !retryable || attempt + 1 >= attempts {
            return Err(RetryError::Failed(err));
        }

        let delay = policy.delay(attempt);
        warn!(
            operation = what,
            attempt = attempt + 1,
            max_attempts = attempts,
            retryable,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {},
        }
        attempt += 1;
    }
}
