//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use rand::Rng;
use std::time::Duration;

/// Configuration for the sync coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retryable failures tolerated before an entry is dead-lettered.
    pub max_retries: u32,
    /// Upper bound on a single submit call.
    pub submit_timeout: Duration,
    /// Backoff between retries of the same entry.
    pub retry: RetryConfig,
    /// Interval for periodic passes while online.
    pub auto_sync_interval: Option<Duration>,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            submit_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            auto_sync_interval: None,
        }
    }

    /// Sets the retry limit.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the submit timeout.
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enables periodic passes while online.
    pub fn with_auto_sync_interval(mut self, interval: Duration) -> Self {
        self.auto_sync_interval = Some(interval);
        self
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> SyncResult<()> {
        if self.submit_timeout.is_zero() {
            return Err(SyncError::InvalidConfig(
                "submit_timeout must be greater than zero".into(),
            ));
        }
        if self.auto_sync_interval.is_some_and(|i| i.is_zero()) {
            return Err(SyncError::InvalidConfig(
                "auto_sync_interval must be greater than zero".into(),
            ));
        }
        self.retry.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry backoff.
///
/// Backoff is applied between passes: a failed entry stays queued with a
/// `next_attempt_at` and passes skip it until then.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% random jitter.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a configuration with default backoff.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Retries on the very next pass.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Delay before retry number `retry` (1-based). Retry 0 has no delay.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter && delay_secs > 0.0 {
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }

    fn validate(&self) -> SyncResult<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(format!(
                "backoff_multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(SyncError::InvalidConfig(
                "max_delay must not be below initial_delay".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the connectivity probe.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between probes.
    pub probe_interval: Duration,
    /// Upper bound on one probe; exceeding it counts as offline.
    pub probe_timeout: Duration,
}

impl MonitorConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            probe_interval: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_max_retries(5)
            .with_submit_timeout(Duration::from_secs(10))
            .with_auto_sync_interval(Duration::from_secs(60));

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.submit_timeout, Duration::from_secs(10));
        assert_eq!(config.auto_sync_interval, Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.submit_timeout, Duration::from_secs(30));
        assert!(config.auto_sync_interval.is_none());
    }

    #[test]
    fn invalid_values_rejected() {
        let zero_timeout = SyncConfig::new().with_submit_timeout(Duration::ZERO);
        assert!(matches!(
            zero_timeout.validate(),
            Err(SyncError::InvalidConfig(_))
        ));

        let shrinking = SyncConfig::new().with_retry(RetryConfig::new().with_backoff_multiplier(0.5));
        assert!(shrinking.validate().is_err());

        let inverted = SyncConfig::new().with_retry(
            RetryConfig::new()
                .with_initial_delay(Duration::from_secs(10))
                .with_max_delay(Duration::from_secs(1)),
        );
        assert!(inverted.validate().is_err());

        let zero_interval = SyncConfig::new().with_auto_sync_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn immediate_retry_has_no_delay() {
        let config = RetryConfig::immediate();
        for retry in 0..5 {
            assert_eq!(config.delay_for_retry(retry), Duration::ZERO);
        }
        assert!(SyncConfig::new().with_retry(config).validate().is_ok());
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_retry(0), Duration::ZERO);

        let delay1 = config.delay_for_retry(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay3 = config.delay_for_retry(3);
        assert!(delay3 >= Duration::from_millis(400));
        assert!(delay3 <= Duration::from_millis(500));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_retry(6), Duration::from_secs(5));
        assert_eq!(config.delay_for_retry(u32::MAX), Duration::from_secs(5));
    }
}
