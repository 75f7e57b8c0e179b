//! Error types for Batchr
//!
//! Centralized error handling using thiserror. Remote failures have their own
//! type in [`crate::service::ServiceError`] because the executor recovers them
//! instead of propagating them.

use thiserror::Error;

use crate::service::ServiceError;

/// All error types that can surface from Batchr setup and I/O
#[derive(Debug, Error)]
pub enum BatchrError {
    /// Invalid or inconsistent configuration
    #[error("Config error: {0}")]
    Config(String),

    /// A credential environment variable was not set
    #[error("Missing credential: environment variable {env_var} not set")]
    MissingCredential { env_var: String },

    /// Remote job service error outside the dispatch path
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Batchr operations
pub type Result<T> = std::result::Result<T, BatchrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = BatchrError::Config("rate must be positive".to_string());
        assert_eq!(err.to_string(), "Config error: rate must be positive");
    }

    #[test]
    fn test_missing_credential_error() {
        let err = BatchrError::MissingCredential {
            env_var: "BATCHR_AUTH_TOKEN".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing credential: environment variable BATCHR_AUTH_TOKEN not set"
        );
    }

    #[test]
    fn test_service_error_conversion() {
        let err: BatchrError = ServiceError::InvalidResponse("empty page".to_string()).into();
        assert!(matches!(err, BatchrError::Service(_)));
        assert!(err.to_string().contains("empty page"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BatchrError = io_err.into();
        assert!(matches!(err, BatchrError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_err = serde_yaml::from_str::<u32>("not: [a number").unwrap_err();
        let err: BatchrError = yaml_err.into();
        assert!(matches!(err, BatchrError::Yaml(_)));
    }
}
