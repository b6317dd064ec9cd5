use rand::Rng;
use std::time::Duration;

use crate::config::BackoffConfig;

/// Doubling stops here; 2^16 times any sane base is already past the cap.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Jitter is at most this fraction of the computed delay.
const JITTER_DIVISOR: u32 = 4;

/// Capped exponential delay before reconnect attempt `attempt` (0-based).
///
/// Attempt 0 waits exactly `base`. A cap below `base` is raised to `base`.
pub fn reconnect_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let cap = cap.max(base);
    let factor = 2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT));
    base.saturating_mul(factor).min(cap)
}

/// Reconnect schedule for one outage.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Attempts made since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Whether the configured reconnect budget is used up.
    pub fn exhausted(&self) -> bool {
        self.config
            .max_attempts
            .is_some_and(|max| self.attempt >= max)
    }

    /// Delay before the next attempt, counting it.
    ///
    /// Later attempts get up to a quarter of random extra delay, still
    /// bounded by the cap. The result is never below `base`.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.config.base;
        let cap = self.config.max_delay.max(base);
        let delay = reconnect_delay(self.attempt, base, cap);
        let jittered = if self.attempt == 0 {
            delay
        } else {
            let spread = delay / JITTER_DIVISOR;
            let extra = rand::rng().random_range(Duration::ZERO..=spread);
            (delay + extra).min(cap)
        };
        self.attempt = self.attempt.saturating_add(1);
        jittered.max(base)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
