//! Authenticated HTTP session shared by every service client

use crate::cdn::CdnClient;
use crate::cis::CisClient;
use crate::config::ClientConfig;
use crate::container::ContainerClient;
use crate::error::{ClientError, Result};
use crate::iam::{AuthStatus, IamAuthenticator};
use crate::tagging::TaggingClient;
use crate::vpc::VpcClient;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// How the IAM token is presented to a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `X-Auth-User-Token: Bearer <token>` (Cloud Internet Services)
    UserToken,
}

struct Inner {
    http: reqwest::Client,
    auth: IamAuthenticator,
    config: ClientConfig,
}

/// Shared HTTP client, authenticator and configuration
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Session authenticating with the configured API key
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http(&config)?;
        let auth = IamAuthenticator::new(
            http.clone(),
            config.require_api_key()?,
            config.endpoints.iam.clone(),
        );
        Ok(Self::from_parts(http, auth, config))
    }

    /// Session using a caller supplied authenticator
    pub fn with_authenticator(config: ClientConfig, auth: IamAuthenticator) -> Result<Self> {
        let http = build_http(&config)?;
        Ok(Self::from_parts(http, auth, config))
    }

    fn from_parts(http: reqwest::Client, auth: IamAuthenticator, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner { http, auth, config }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    pub fn vpc(&self) -> VpcClient {
        VpcClient::new(self.clone())
    }

    pub fn cis(&self) -> CisClient {
        CisClient::new(self.clone())
    }

    pub fn cdn(&self) -> CdnClient {
        CdnClient::new(self.clone())
    }

    pub fn container(&self) -> ContainerClient {
        ContainerClient::new(self.clone())
    }

    pub fn tagging(&self) -> TaggingClient {
        TaggingClient::new(self.clone())
    }

    pub async fn check_auth(&self) -> AuthStatus {
        self.inner.auth.check().await
    }

    /// Send a request, retrying throttling, server errors and connect failures
    pub async fn send(&self, request: RequestBuilder, scheme: AuthScheme) -> Result<Response> {
        let retry = &self.inner.config.retry;
        let mut attempt = 0u32;
        let mut reauthenticated = false;

        loop {
            let token = self.inner.auth.token().await?;
            let builder = request.try_clone().ok_or_else(|| {
                ClientError::InvalidConfig("request body cannot be retried".to_string())
            })?;
            let builder = match scheme {
                AuthScheme::Bearer => builder.bearer_auth(&token),
                AuthScheme::UserToken => builder.header("X-Auth-User-Token", format!("Bearer {}", token)),
            };

            let failure = match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == StatusCode::UNAUTHORIZED && !reauthenticated {
                        tracing::debug!("Token rejected, re-authenticating");
                        self.inner.auth.invalidate().await;
                        reauthenticated = true;
                        continue;
                    }
                    let url = response.url().to_string();
                    let body = response.text().await.unwrap_or_default();
                    let message = error_message(&body);
                    if status == StatusCode::NOT_FOUND {
                        return Err(ClientError::NotFound(format!("{} ({})", url, message)));
                    }
                    if !is_retryable(status) {
                        return Err(ClientError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    ClientError::Api {
                        status: status.as_u16(),
                        message,
                    }
                }
                Err(e) if e.is_connect() || e.is_timeout() => ClientError::Http(e),
                Err(e) => return Err(ClientError::Http(e)),
            };

            attempt += 1;
            if attempt > retry.max_attempts {
                if retry.max_attempts == 0 {
                    return Err(failure);
                }
                return Err(ClientError::RetriesExhausted {
                    attempts: attempt,
                    message: failure.to_string(),
                });
            }
            let delay = retry.delay_for(attempt);
            tracing::warn!("{}; retrying in {:?} (attempt {})", failure, delay, attempt);
            tokio::time::sleep(delay).await;
        }
    }

    /// Send and decode a JSON response
    pub async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, scheme: AuthScheme) -> Result<T> {
        let response = self.send(request, scheme).await?;
        Ok(response.json().await?)
    }

    /// Send and discard the response body
    pub async fn empty(&self, request: RequestBuilder, scheme: AuthScheme) -> Result<()> {
        self.send(request, scheme).await?;
        Ok(())
    }
}

fn build_http(config: &ClientConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(concat!("ibmform/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Best-effort error message from the error bodies of the different services
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let first_error = value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first());
    if let Some(err) = first_error {
        let message = err.get("message").and_then(Value::as_str).unwrap_or_default();
        return match err.get("code") {
            Some(Value::String(code)) => format!("{}: {}", code, message),
            Some(Value::Number(code)) => format!("{}: {}", code, message),
            _ => message.to_string(),
        };
    }

    for key in ["description", "message", "errorMessage", "error"] {
        if let Some(msg) = value.get(key).and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    body.trim().to_string()
}
