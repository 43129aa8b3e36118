//! Between-sweep backoff owned by the scheduling loop

use std::time::Duration;

pub const DEFAULT_SWEEP_BACKOFF_BASE: Duration = Duration::from_secs(3);
pub const DEFAULT_SWEEP_BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Exponential backoff state: `base * 2^step`, capped, reset on success.
///
/// The step only advances while the delay is still below the cap, so a long
/// outage settles on `cap` without overflowing.
#[derive(Debug, Clone)]
pub struct SweepBackoff {
    base: Duration,
    cap: Duration,
    step: u32,
}

impl Default for SweepBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_BACKOFF_BASE, DEFAULT_SWEEP_BACKOFF_CAP)
    }
}

impl SweepBackoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap, step: 0 }
    }

    /// Returns the delay for the current failure and advances the step
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.checked_pow(self.step);
        match factor.and_then(|f| self.base.checked_mul(f)) {
            Some(delay) if delay <= self.cap => {
                self.step += 1;
                delay
            },
            _ => self.cap,
        }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.step
    }
}
