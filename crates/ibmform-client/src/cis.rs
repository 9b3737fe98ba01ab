//! Cloud Internet Services (CIS) API client
//!
//! CIS is addressed per instance CRN and zone:
//! `/v1/{crn}/zones/{zone_id}/...`. Responses use the
//! `{success, errors, result}` envelope.

use crate::error::{ClientError, Result};
use crate::session::{AuthScheme, Session};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    message: String,
}

// --- DNS records ---

#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub content: String,
    pub ttl: i64,
    #[serde(default)]
    pub proxied: bool,
    #[serde(default)]
    pub proxiable: bool,
    pub priority: Option<i64>,
    pub data: Option<Value>,
    pub zone_id: Option<String>,
    pub zone_name: Option<String>,
    pub created_on: Option<String>,
    pub modified_on: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DnsRecordRequest {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub ttl: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// --- Rate limits ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimit {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bypass: Vec<RateLimitBypass>,
    pub threshold: i64,
    pub period: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlate: Option<RateLimitCorrelate>,
    pub action: RateLimitAction,
    #[serde(rename = "match")]
    pub match_: RateLimitMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitBypass {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitCorrelate {
    pub by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitAction {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<RateLimitActionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitActionResponse {
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RateLimitMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RateLimitMatchRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<RateLimitMatchResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RateLimitMatchRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RateLimitMatchResponse {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<RateLimitHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_traffic: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitHeader {
    pub name: String,
    pub op: String,
    pub value: String,
}

// --- Edge functions ---

/// Edge function script metadata
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeFunctionScript {
    pub id: String,
    pub etag: Option<String>,
    pub created_on: Option<String>,
    pub modified_on: Option<String>,
}

/// Edge function route (trigger)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeFunctionTrigger {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

/// Client for one CIS instance
#[derive(Clone)]
pub struct CisClient {
    session: Session,
    base: String,
}

impl CisClient {
    pub fn new(session: Session) -> Self {
        let base = session.config().endpoints.cis.clone();
        Self { session, base }
    }

    fn zone_url(&self, crn: &str, zone_id: &str, path: &str) -> String {
        format!(
            "{}/v1/{}/zones/{}{}",
            self.base,
            escape_segment(crn),
            escape_segment(zone_id),
            path
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<&Value>,
    ) -> Result<T> {
        tracing::debug!("CIS {} {}", method, url);
        let mut request = self.session.http().request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let envelope: ApiResponse<T> = self.session.json(request, AuthScheme::UserToken).await?;

        if !envelope.success {
            let message = envelope
                .errors
                .first()
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(ClientError::Api {
                status: 400,
                message,
            });
        }
        envelope
            .result
            .ok_or_else(|| ClientError::Api {
                status: 200,
                message: format!("empty result from {}", url),
            })
    }

    // DNS records

    pub async fn create_dns_record(&self, crn: &str, zone_id: &str, record: &DnsRecordRequest) -> Result<DnsRecord> {
        let body = serde_json::to_value(record)?;
        self.call(Method::POST, self.zone_url(crn, zone_id, "/dns_records"), Some(&body))
            .await
    }

    pub async fn get_dns_record(&self, crn: &str, zone_id: &str, record_id: &str) -> Result<DnsRecord> {
        self.call(
            Method::GET,
            self.zone_url(crn, zone_id, &format!("/dns_records/{}", record_id)),
            None,
        )
        .await
    }

    pub async fn update_dns_record(
        &self,
        crn: &str,
        zone_id: &str,
        record_id: &str,
        record: &DnsRecordRequest,
    ) -> Result<DnsRecord> {
        let body = serde_json::to_value(record)?;
        self.call(
            Method::PUT,
            self.zone_url(crn, zone_id, &format!("/dns_records/{}", record_id)),
            Some(&body),
        )
        .await
    }

    pub async fn delete_dns_record(&self, crn: &str, zone_id: &str, record_id: &str) -> Result<()> {
        let _: IdOnly = self
            .call(
                Method::DELETE,
                self.zone_url(crn, zone_id, &format!("/dns_records/{}", record_id)),
                None,
            )
            .await?;
        Ok(())
    }

    // Rate limits

    pub async fn create_rate_limit(&self, crn: &str, zone_id: &str, rule: &RateLimit) -> Result<RateLimit> {
        let body = serde_json::to_value(rule)?;
        self.call(Method::POST, self.zone_url(crn, zone_id, "/rate_limits"), Some(&body))
            .await
    }

    pub async fn get_rate_limit(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<RateLimit> {
        self.call(
            Method::GET,
            self.zone_url(crn, zone_id, &format!("/rate_limits/{}", rule_id)),
            None,
        )
        .await
    }

    pub async fn update_rate_limit(
        &self,
        crn: &str,
        zone_id: &str,
        rule_id: &str,
        rule: &RateLimit,
    ) -> Result<RateLimit> {
        let body = serde_json::to_value(rule)?;
        self.call(
            Method::PUT,
            self.zone_url(crn, zone_id, &format!("/rate_limits/{}", rule_id)),
            Some(&body),
        )
        .await
    }

    pub async fn delete_rate_limit(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<()> {
        let _: IdOnly = self
            .call(
                Method::DELETE,
                self.zone_url(crn, zone_id, &format!("/rate_limits/{}", rule_id)),
                None,
            )
            .await?;
        Ok(())
    }

    // Edge function actions (scripts)

    /// Upload (create or replace) an edge function script
    pub async fn put_edge_function_script(
        &self,
        crn: &str,
        zone_id: &str,
        name: &str,
        script: &str,
    ) -> Result<EdgeFunctionScript> {
        let url = self.zone_url(crn, zone_id, &format!("/workers/script/{}", name));
        tracing::debug!("CIS PUT {}", url);
        let request = self
            .session
            .http()
            .put(&url)
            .header("Content-Type", "application/javascript")
            .body(script.to_string());
        let envelope: ApiResponse<EdgeFunctionScript> =
            self.session.json(request, AuthScheme::UserToken).await?;
        if !envelope.success {
            return Err(ClientError::Api {
                status: 400,
                message: envelope
                    .errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        envelope.result.ok_or_else(|| ClientError::Api {
            status: 200,
            message: format!("empty result from {}", url),
        })
    }

    /// Download the raw script body
    pub async fn get_edge_function_script(&self, crn: &str, zone_id: &str, name: &str) -> Result<String> {
        let url = self.zone_url(crn, zone_id, &format!("/workers/script/{}", name));
        tracing::debug!("CIS GET {}", url);
        let request = self.session.http().get(&url);
        let response = self.session.send(request, AuthScheme::UserToken).await?;
        Ok(response.text().await?)
    }

    pub async fn delete_edge_function_script(&self, crn: &str, zone_id: &str, name: &str) -> Result<()> {
        let url = self.zone_url(crn, zone_id, &format!("/workers/script/{}", name));
        tracing::debug!("CIS DELETE {}", url);
        let request = self.session.http().delete(&url);
        self.session.empty(request, AuthScheme::UserToken).await
    }

    // Edge function triggers (routes)

    pub async fn create_edge_function_trigger(
        &self,
        crn: &str,
        zone_id: &str,
        trigger: &EdgeFunctionTrigger,
    ) -> Result<String> {
        let body = serde_json::to_value(trigger)?;
        let created: IdOnly = self
            .call(Method::POST, self.zone_url(crn, zone_id, "/workers/routes"), Some(&body))
            .await?;
        Ok(created.id)
    }

    pub async fn get_edge_function_trigger(
        &self,
        crn: &str,
        zone_id: &str,
        trigger_id: &str,
    ) -> Result<EdgeFunctionTrigger> {
        self.call(
            Method::GET,
            self.zone_url(crn, zone_id, &format!("/workers/routes/{}", trigger_id)),
            None,
        )
        .await
    }

    pub async fn update_edge_function_trigger(
        &self,
        crn: &str,
        zone_id: &str,
        trigger_id: &str,
        trigger: &EdgeFunctionTrigger,
    ) -> Result<EdgeFunctionTrigger> {
        let body = serde_json::to_value(trigger)?;
        self.call(
            Method::PUT,
            self.zone_url(crn, zone_id, &format!("/workers/routes/{}", trigger_id)),
            Some(&body),
        )
        .await
    }

    pub async fn delete_edge_function_trigger(&self, crn: &str, zone_id: &str, trigger_id: &str) -> Result<()> {
        let _: IdOnly = self
            .call(
                Method::DELETE,
                self.zone_url(crn, zone_id, &format!("/workers/routes/{}", trigger_id)),
                None,
            )
            .await?;
        Ok(())
    }
}

/// CRNs may contain `/`, which must not split the path
fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}
