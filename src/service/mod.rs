//! Remote Job Service layer
//!
//! This module provides:
//! - RemoteJobService trait for the create/transition/remove/list capabilities
//! - HttpJobService implementation over a REST API
//! - ScriptedJobService for deterministic tests

pub mod http;
pub mod mock;
pub mod traits;

pub use http::{Credentials, HttpJobService};
pub use mock::{ScriptedJobService, ServiceCall};
pub use traits::{RemoteJobService, ServiceError};
