//! Work sources
//!
//! - **CounterSource**: record indices `1..=N` for bounded runs
//! - **ListingSource**: round-based enumeration of the remote listing into
//!   transition and removal queues

mod counter;
mod listing;

pub use counter::CounterSource;
pub use listing::{ListingConfig, ListingSource, RoundSignal, TargetQueues};
