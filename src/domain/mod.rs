//! Domain types for Batchr
//!
//! This module contains the core domain types:
//! - WorkItem: The unit of dispatch (operation, origin, round, attempt)
//! - Job types: Requests, listing entries and filters for the remote service
//! - RunOutcome: How a dispatch run ended

pub mod item;
pub mod job;
pub mod outcome;

pub use item::{OpKind, Operation, Origin, WorkItem};
pub use job::{CreateTemplate, JobRequest, JobState, JobStatus, ListFilter, RemoteJob};
pub use outcome::RunOutcome;
