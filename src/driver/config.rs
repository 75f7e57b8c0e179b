//! Dispatch loop configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Dispatch loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Interval between driver ticks in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Number of records to create in bounded mode
    #[serde(default = "default_total")]
    pub total: u64,

    /// Delay before a retried operation is performed
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Probability a failed item is re-queued; 1.0 re-queues every failure
    #[serde(default = "default_retry_sample_rate")]
    pub retry_sample_rate: f64,

    /// Skip ticks for the rejection's `retry_after` on rate-limit failures
    #[serde(default = "default_backoff")]
    pub backoff_on_rate_limit: bool,
}

fn default_tick_ms() -> u64 {
    5
}

fn default_total() -> u64 {
    250_000
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_retry_sample_rate() -> f64 {
    1.0
}

fn default_backoff() -> bool {
    true
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            total: default_total(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_sample_rate: default_retry_sample_rate(),
            backoff_on_rate_limit: default_backoff(),
        }
    }
}

impl DispatchConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_rate(self.retry_sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.tick(), Duration::from_millis(5));
        assert_eq!(config.total, 250_000);
        assert_eq!(config.retry_delay(), Duration::from_millis(100));
        assert_eq!(config.retry_policy(), RetryPolicy::Always);
        assert!(config.backoff_on_rate_limit);
    }

    #[test]
    fn test_partial_yaml() {
        let config: DispatchConfig = serde_yaml::from_str("total: 10\nretry_sample_rate: 0.75\n").unwrap();
        assert_eq!(config.total, 10);
        assert_eq!(config.tick_ms, 5);
        assert_eq!(config.retry_policy(), RetryPolicy::Sampled(0.75));
    }

    #[test]
    fn test_zero_tick_clamped() {
        let config = DispatchConfig {
            tick_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.tick(), Duration::from_millis(1));
    }
}
