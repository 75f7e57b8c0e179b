//! Periodic terminal reporters

use std::io::{Write, stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    ExecutableCommand,
    cursor::MoveTo,
    terminal::{Clear, ClearType},
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::metrics::ProgressReport;
use super::render::{Dashboard, render_count, render_dashboard};
use crate::state::RunState;

/// Reporter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Draw anything at all
    pub enabled: bool,
    /// Dashboard refresh interval in milliseconds
    pub interval_ms: u64,
    /// Listing count refresh interval in milliseconds
    pub count_interval_ms: u64,
    /// Clear the terminal before each frame
    pub clear_screen: bool,
    pub color: bool,
    /// Print every retained error after the summary
    pub itemize_errors: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 500,
            count_interval_ms: 100,
            clear_screen: true,
            color: true,
            itemize_errors: false,
        }
    }
}

impl ReportConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn count_interval(&self) -> Duration {
        Duration::from_millis(self.count_interval_ms.max(1))
    }
}

fn draw(frame: &str, clear: bool) {
    let mut out = stdout();
    if clear
        && let Err(e) = out
            .execute(Clear(ClearType::All))
            .and_then(|out| out.execute(MoveTo(0, 0)))
    {
        warn!(error = %e, "Failed to clear terminal");
    }
    if let Err(e) = out.write_all(frame.as_bytes()).and_then(|_| out.flush()) {
        warn!(error = %e, "Failed to write progress report");
    }
}

/// Redraws the progress dashboard on a fixed interval
pub struct ProgressReporter {
    state: Arc<RunState>,
    dashboard: Dashboard,
    total: Option<u64>,
    config: ReportConfig,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(state: Arc<RunState>, dashboard: Dashboard, total: Option<u64>, config: ReportConfig) -> Self {
        Self {
            state,
            dashboard,
            total,
            config,
            started: Instant::now(),
        }
    }

    pub fn report(&self) -> ProgressReport {
        ProgressReport::compute(&self.state.snapshot(), self.started.elapsed(), self.total)
    }

    /// Render the current frame
    pub fn frame(&self) -> String {
        let counters = self.state.snapshot();
        let report = ProgressReport::compute(&counters, self.started.elapsed(), self.total);
        render_dashboard(self.dashboard, &report, &counters, self.config.color)
    }

    /// Redraw until `token` is cancelled, then flush one final frame
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        if !self.config.enabled {
            return tokio::spawn(async {});
        }
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => draw(&self.frame(), self.config.clear_screen),
                }
            }
            draw(&self.frame(), self.config.clear_screen);
        })
    }
}

/// Live count of listed items, redrawn only when it changes
pub struct CountReporter {
    state: Arc<RunState>,
    config: ReportConfig,
    last: Option<u64>,
}

impl CountReporter {
    pub fn new(state: Arc<RunState>, config: ReportConfig) -> Self {
        Self {
            state,
            config,
            last: None,
        }
    }

    /// The frame to draw, if the count moved since the last one
    pub fn poll(&mut self) -> Option<String> {
        let count = self.state.snapshot().listed;
        if self.last == Some(count) {
            return None;
        }
        self.last = Some(count);
        Some(render_count(count))
    }

    pub fn spawn(mut self, token: CancellationToken) -> JoinHandle<()> {
        if !self.config.enabled {
            return tokio::spawn(async {});
        }
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.count_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(frame) = self.poll() {
                            draw(&frame, self.config.clear_screen);
                        }
                    }
                }
            }
            if let Some(frame) = self.poll() {
                draw(&frame, self.config.clear_screen);
            }
            draw("\n", false);
        })
    }
}
