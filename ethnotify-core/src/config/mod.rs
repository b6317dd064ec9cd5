//! Typed runtime settings handed to the poller at construction.

use std::time::Duration;

/// Default seconds between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Default ceiling for the reconnect backoff.
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

/// Reconnect backoff settings.
///
/// The first delay equals `base`; later delays double up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_POLL_INTERVAL,
            max_delay: DEFAULT_MAX_RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Blocks below the head that count as confirmed.
    pub confirmations: u64,
    pub backoff: BackoffConfig,
}

impl PollerConfig {
    /// Settings with the reconnect backoff anchored to `poll_interval`.
    pub fn new(poll_interval: Duration, confirmations: u64) -> Self {
        Self {
            poll_interval,
            confirmations,
            backoff: BackoffConfig {
                base: poll_interval,
                ..BackoffConfig::default()
            },
        }
    }

    pub fn with_max_reconnect_delay(mut self, max_delay: Duration) -> Self {
        self.backoff.max_delay = max_delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: Option<u32>) -> Self {
        self.backoff.max_attempts = attempts;
        self
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, 0)
    }
}
