//! Progress metrics

use std::time::Duration;

use serde::Serialize;

use crate::state::CounterSnapshot;

/// Derived progress figures for one report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressReport {
    pub elapsed: Duration,
    /// Successful operations so far
    pub throughput: u64,
    pub per_second: f64,
    pub per_minute: f64,
    /// Known only when a total is set and the rate is non-zero
    pub eta: Option<Duration>,
    pub total: Option<u64>,
}

impl ProgressReport {
    pub fn compute(snapshot: &CounterSnapshot, elapsed: Duration, total: Option<u64>) -> Self {
        let throughput = snapshot.succeeded();
        let seconds = elapsed.as_secs_f64();
        let per_second = finite_ratio(throughput as f64, seconds);
        let per_minute = finite_ratio(throughput as f64, seconds / 60.0);

        let eta = total.and_then(|total| {
            let remaining = total.saturating_sub(throughput) as f64;
            let minutes = finite_ratio(remaining, per_minute);
            if remaining == 0.0 {
                Some(Duration::ZERO)
            } else if minutes > 0.0 {
                Duration::try_from_secs_f64(minutes * 60.0).ok()
            } else {
                None
            }
        });

        Self {
            elapsed,
            throughput,
            per_second,
            per_minute,
            eta,
            total,
        }
    }
}

/// `num / den`, or zero when the result is not a finite number
fn finite_ratio(num: f64, den: f64) -> f64 {
    if den <= 0.0 {
        return 0.0;
    }
    let value = num / den;
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(created: u64) -> CounterSnapshot {
        CounterSnapshot {
            created,
            ..Default::default()
        }
    }

    #[test]
    fn test_rates() {
        let report = ProgressReport::compute(&snapshot(300), Duration::from_secs(60), None);
        assert_eq!(report.throughput, 300);
        assert_eq!(report.per_second, 5.0);
        assert_eq!(report.per_minute, 300.0);
        assert_eq!(report.eta, None);
    }

    #[test]
    fn test_eta_uses_remaining() {
        let report = ProgressReport::compute(&snapshot(100), Duration::from_secs(60), Some(400));
        // 300 remaining at 100 per minute
        assert_eq!(report.eta, Some(Duration::from_secs(180)));
    }

    #[test]
    fn test_zero_elapsed_is_zero_rate() {
        let report = ProgressReport::compute(&snapshot(10), Duration::ZERO, Some(100));
        assert_eq!(report.per_second, 0.0);
        assert_eq!(report.per_minute, 0.0);
        assert_eq!(report.eta, None);
    }

    #[test]
    fn test_no_progress_eta_unknown() {
        let report = ProgressReport::compute(&snapshot(0), Duration::from_secs(30), Some(100));
        assert_eq!(report.eta, None);
    }

    #[test]
    fn test_done_eta_zero() {
        let report = ProgressReport::compute(&snapshot(100), Duration::from_secs(30), Some(100));
        assert_eq!(report.eta, Some(Duration::ZERO));
    }
}
