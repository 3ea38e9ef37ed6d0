//! Exponential backoff with jitter.

use std::time::Duration;

/// Default jitter as a fraction of the un-jittered delay.
pub const DEFAULT_JITTER_RATIO: f64 = 0.2;

/// Outcome of [`RetryPolicy::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Wait this long, then make the next attempt.
    Wait(Duration),
    /// Attempt budget exhausted.
    Terminal,
}

/// Stateless exponential backoff calculator.
///
/// Attempts are numbered from 1. The wait after attempt `n` is
/// `min(max_delay, base_delay * 2^(n-1) + jitter)`, where jitter is uniform in
/// `[0, jitter_ratio * base_delay * 2^(n-1)]`. Callers own the attempt counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter_ratio: f64,
}

impl RetryPolicy {
    /// Policy allowing at most `max_attempts` attempts (at least one).
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: Some(max_attempts.max(1)),
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }

    /// Policy that never gives up.
    pub fn unbounded(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: None,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }

    /// Sets the jitter ratio, clamped to `[0, 1]`.
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Deterministic part of the wait after attempt `attempt`, capped at the max delay.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }

    /// Jittered wait after attempt `attempt`. Attempt 0 means "no attempt yet" and waits nothing.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1);
        let raw = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        let jitter = raw.mul_f64(self.jitter_ratio * rand::random::<f64>());
        raw.saturating_add(jitter).min(self.max_delay)
    }

    /// Decides what follows the failure of attempt `failed_attempt`.
    pub fn next(&self, failed_attempt: u32) -> Backoff {
        match self.max_attempts {
            Some(max) if failed_attempt >= max => Backoff::Terminal,
            _ => Backoff::Wait(self.delay(failed_attempt)),
        }
    }
}
