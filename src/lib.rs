//! Batchr - rate-limited bulk dispatch of remote job operations
//!
//! A single driver task ticks on a fixed interval and admits at most one work
//! item per tick into a rate gate. The gate caps operations in flight and
//! operations started per rolling window. Failed operations are recorded and
//! re-queued; a bounded run ends once every record has succeeded, a listing
//! run works through the remote listing in rounds.

pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod errorlog;
pub mod executor;
pub mod gate;
pub mod report;
pub mod retry;
pub mod runner;
pub mod service;
pub mod source;
pub mod state;

pub use domain::{OpKind, Operation, Origin, RunOutcome, WorkItem};
pub use driver::{DispatchConfig, DispatchContext, Driver, RunSummary, TickOutcome};
pub use error::{BatchrError, Result};
