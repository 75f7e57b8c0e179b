//! Sliding admission window.
//!
//! Keeps the instants of recent admissions. A new admission is allowed only
//! while fewer than `limit` admissions fall inside the trailing `interval`,
//! so any window of length `interval` holds at most `limit` admissions.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct RateWindow {
    limit: usize,
    interval: Duration,
    admissions: VecDeque<Instant>,
}

impl RateWindow {
    /// A `limit` of zero disables the window.
    pub fn new(limit: usize, interval: Duration) -> Self {
        Self {
            limit,
            interval,
            admissions: VecDeque::with_capacity(limit),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.admissions.front() {
            if now.saturating_duration_since(*oldest) >= self.interval {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit at `now`, or return how long until a slot frees up.
    pub fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        if self.limit == 0 {
            return Ok(());
        }
        self.prune(now);
        if self.admissions.len() < self.limit {
            self.admissions.push_back(now);
            return Ok(());
        }
        let oldest = self.admissions.front().copied().unwrap_or(now);
        Err(self.interval.saturating_sub(now.saturating_duration_since(oldest)))
    }

    /// Wait for a slot and take it.
    pub async fn acquire(&mut self) {
        loop {
            match self.try_admit(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    tracing::trace!(?wait, "Rate window full");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Admissions currently inside the window as of `now`
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.admissions.len()
    }
}
