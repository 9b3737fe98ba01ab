//! Provider error types

use std::time::Duration;
use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Resource type not supported: {0}")]
    ResourceTypeNotFound(String),

    #[error("Data source not supported: {0}")]
    DataSourceNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid ID '{id}': expected {expected}")]
    InvalidId { id: String, expected: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Attribute '{key}' is missing or is not a {expected}")]
    Attribute { key: String, expected: &'static str },

    #[error("API error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error(
        "Timeout after {timeout:?} waiting for {target:?} (last state: '{last_state}')"
    )]
    Timeout {
        last_state: String,
        target: Vec<String>,
        timeout: Duration,
    },

    #[error("Unexpected state '{state}', wanted one of {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Shorthand for an API error without an HTTP status
    pub fn api(message: impl Into<String>) -> Self {
        ProviderError::Api {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProviderError::ResourceNotFound(_) | ProviderError::Api { status: Some(404), .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
