//! Configuration for the sync engine.

use std::time::Duration;

/// Maximum remote attempts per command before it is marked failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How often the queue drains pending commands while running.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(20);

/// Configuration for the sync queue.
///
/// Retry scheduling is a fixed polling interval, not exponential
/// backoff. The primary trigger for resumption is connectivity
/// regained, not elapsed time.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between periodic drain passes.
    pub drain_interval: Duration,
    /// Maximum remote attempts per command.
    pub max_retries: u32,
}

impl SyncConfig {
    /// Creates a configuration with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the drain interval.
    #[must_use]
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.drain_interval, Duration::from_secs(20));
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_drain_interval(Duration::from_millis(50))
            .with_max_retries(5);

        assert_eq!(config.drain_interval, Duration::from_millis(50));
        assert_eq!(config.max_retries, 5);
    }
}
