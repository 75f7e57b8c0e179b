//! Remote job service trait and error type

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::{JobRequest, JobState, ListFilter, RemoteJob};

/// The remote job service the dispatch engine drives.
///
/// Every call is independent. Failures are returned, never panicked, so the
/// executor can route them to the retry path.
#[async_trait]
pub trait RemoteJobService: Send + Sync {
    /// Schedule a unit of work for future execution
    async fn create(&self, request: JobRequest) -> Result<(), ServiceError>;

    /// Change the state of an existing remote job
    async fn transition(&self, id: &str, state: JobState) -> Result<(), ServiceError>;

    /// Delete an existing remote job
    async fn remove(&self, id: &str) -> Result<(), ServiceError>;

    /// Enumerate jobs lazily. Dropping the stream stops the enumeration.
    fn list(&self, filter: ListFilter) -> BoxStream<'static, Result<RemoteJob, ServiceError>>;
}

/// Errors returned by the remote job service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Suggested pause before the next admission, if the service gave one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ServiceError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
