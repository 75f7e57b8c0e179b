//! Dispatch driver
//!
//! The tick loop that turns work sources into gate admissions:
//! - **Driver**: one admission decision per tick, strict source priority
//! - **Completion**: bounded termination and the listing round lifecycle
//! - **PauseHandle**: operator and back-off tick skipping

mod completion;
mod config;
mod dispatch;
mod pause;

pub use completion::Completion;
pub use config::DispatchConfig;
pub use dispatch::{DispatchContext, Driver, RunSummary, TickOutcome};
pub use pause::PauseHandle;
