//! Rate gate configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Max operations running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Max admissions per rate window
    #[serde(default = "default_rate")]
    pub rate: usize,

    /// Rate window duration in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_concurrency() -> usize {
    70
}

fn default_rate() -> usize {
    100
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rate: default_rate(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl GateConfig {
    pub fn new(concurrency: usize, rate: usize, interval: Duration) -> Self {
        Self {
            concurrency,
            rate,
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Get the rate window as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
