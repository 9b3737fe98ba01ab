//! IAM API key to bearer token exchange

use crate::error::{ClientError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const REFRESH_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_WINDOW_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    expiration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct IamErrorResponse {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

enum Credential {
    ApiKey { key: String, endpoint: String },
    Static(String),
}

/// Exchanges an API key for IAM access tokens and caches them
pub struct IamAuthenticator {
    client: reqwest::Client,
    credential: Credential,
    cached: Mutex<Option<CachedToken>>,
}

impl IamAuthenticator {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            credential: Credential::ApiKey {
                key: api_key.into(),
                endpoint: endpoint.into(),
            },
            cached: Mutex::new(None),
        }
    }

    /// Authenticator that always presents the given token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credential: Credential::Static(token.into()),
            cached: Mutex::new(None),
        }
    }

    /// Current access token, fetching a new one when close to expiry
    pub async fn token(&self) -> Result<String> {
        let (key, endpoint) = match &self.credential {
            Credential::Static(token) => return Ok(token.clone()),
            Credential::ApiKey { key, endpoint } => (key, endpoint),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        tracing::debug!("Requesting IAM token from {}", endpoint);
        let response = self
            .client
            .post(format!("{}/identity/token", endpoint))
            .header("Accept", "application/json")
            .form(&[("grant_type", GRANT_TYPE), ("apikey", key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<IamErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_message)
                .unwrap_or(body);
            return Err(ClientError::AuthenticationFailed(format!(
                "{} ({})",
                message,
                status.as_u16()
            )));
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = match (token.expiration, token.expires_in) {
            (Some(epoch), _) => DateTime::from_timestamp(epoch, 0).unwrap_or_else(Utc::now),
            (None, Some(secs)) => Utc::now() + Duration::seconds(secs),
            (None, None) => Utc::now() + Duration::seconds(3600),
        };
        tracing::debug!("IAM token valid until {}", expires_at);

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    /// Force the next `token` call to fetch a new token
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Check that the credentials produce a token
    pub async fn check(&self) -> AuthStatus {
        match self.token().await {
            Ok(_) => AuthStatus::ok(match &self.credential {
                Credential::ApiKey { endpoint, .. } => format!("IAM token issued by {}", endpoint),
                Credential::Static(_) => "static bearer token".to_string(),
            }),
            Err(e) => AuthStatus::failed(e.to_string()),
        }
    }
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
