//! Progress reporting
//!
//! Pure metrics and text rendering, plus the interval tasks that draw them.

mod metrics;
mod render;
mod reporter;

pub use metrics::ProgressReport;
pub use render::{Dashboard, format_count, format_duration, render_count, render_dashboard};
pub use reporter::{CountReporter, ProgressReporter, ReportConfig};
