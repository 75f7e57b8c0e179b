//! Runners - wire config, service, driver and reporters into one run.
//!
//! - schedule: bounded create run with the schedule dashboard
//! - reset: round-based transition/remove run with the reset dashboard
//! - count: live count of the listing

mod count;
mod dispatch;

pub use count::count;
pub use dispatch::{reset, schedule};
