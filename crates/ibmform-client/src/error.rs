//! IBM Cloud client error types

use ibmform_provider::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Missing credentials: set {0}")]
    MissingCredentials(String),

    #[error("IAM authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(what) => ProviderError::ResourceNotFound(what),
            ClientError::Api { status, message } => ProviderError::Api {
                status: Some(status),
                message,
            },
            ClientError::MissingCredentials(_) | ClientError::AuthenticationFailed(_) => {
                ProviderError::AuthenticationFailed(err.to_string())
            }
            ClientError::InvalidConfig(msg) => ProviderError::InvalidConfig(msg),
            ClientError::Json(e) => ProviderError::Json(e),
            other => ProviderError::api(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
