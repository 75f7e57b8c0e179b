//! Dashboard rendering

use std::fmt::Write;
use std::time::Duration;

use colored::*;

use super::metrics::ProgressReport;
use crate::state::CounterSnapshot;

const LABEL_WIDTH: usize = 32;

/// Which dashboard to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dashboard {
    /// Bounded create run
    Schedule,
    /// Listing transition/remove run
    Reset,
}

/// `1234567` -> `1,234,567`
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `3725s` -> `1 Hours, 2 Minutes, 5 Seconds`; leading zero units are omitted
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{} Hours, ", format_count(hours));
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{} Minutes, ", minutes);
    }
    let _ = write!(out, "{} Seconds", seconds);
    out
}

fn format_rate(rate: f64) -> String {
    format_count(rate.round().max(0.0) as u64)
}

struct Lines {
    out: String,
    styled: bool,
}

impl Lines {
    fn line(&mut self, indent: usize, label: &str, value: String) {
        let width = LABEL_WIDTH.saturating_sub(indent);
        let dotted = format!("{:.<width$}", label, width = width);
        let pad = " ".repeat(indent);
        if self.styled {
            let _ = writeln!(self.out, "{}{} {}", pad, dotted.dimmed(), value.bold());
        } else {
            let _ = writeln!(self.out, "{}{} {}", pad, dotted, value);
        }
    }

    fn title(&mut self, title: &str) {
        if self.styled {
            let _ = writeln!(self.out, "{}", title.cyan().bold());
        } else {
            let _ = writeln!(self.out, "{}", title);
        }
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }
}

/// Render the progress dashboard as text
pub fn render_dashboard(dashboard: Dashboard, report: &ProgressReport, counters: &CounterSnapshot, styled: bool) -> String {
    let mut lines = Lines {
        out: String::new(),
        styled,
    };
    let gauges = counters.gauges;
    let eta = report
        .eta
        .map(format_duration)
        .unwrap_or_else(|| "unknown".to_string());

    match dashboard {
        Dashboard::Schedule => {
            lines.title("== Schedule ==");
            lines.line(2, "Running Time", format_duration(report.elapsed));
            lines.line(2, "Estimated Completion Time", eta);
            lines.blank();
            lines.line(2, "Scheduled", format_count(counters.created));
            lines.line(2, "Scheduled / Minute", format_rate(report.per_minute));
            lines.line(2, "Scheduled / Second", format_rate(report.per_second));
            lines.blank();
            lines.line(2, "Connections", format_count(counters.connections as u64));
            lines.line(2, "Errors", format_count(counters.failed));
            lines.blank();
            lines.line(2, "Record Index", format_count(gauges.record_index));
            lines.line(2, "Retry Queue Length", format_count(gauges.retry_depth as u64));
            lines.line(2, "Gate Queue Length", format_count(gauges.gate_queued as u64));
        }
        Dashboard::Reset => {
            lines.title("== Reset ==");
            lines.line(2, "Running Time", format_duration(report.elapsed));
            lines.line(4, "Reset / Minute", format_rate(report.per_minute));
            lines.line(4, "Reset / Second", format_rate(report.per_second));
            lines.blank();
            lines.line(2, "Total Reset", format_count(report.throughput));
            lines.line(4, "Deleted Count", format_count(counters.removed));
            lines.line(4, "Updated Count", format_count(counters.transitioned));
            lines.line(4, "Listed Count", format_count(counters.listed));
            lines.blank();
            lines.line(2, "Round", format_count(gauges.round));
            lines.line(2, "Delete Queue Length", format_count(gauges.removal_depth as u64));
            lines.line(2, "Update Queue Length", format_count(gauges.transition_depth as u64));
            lines.line(2, "Error Count", format_count(counters.failed));
            lines.blank();
            lines.line(2, "Connections", format_count(counters.connections as u64));
        }
    }
    lines.out
}

/// Live listing count
pub fn render_count(count: u64) -> String {
    format!("Count: {}", format_count(count))
}
