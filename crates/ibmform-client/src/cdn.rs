//! CDN domain mappings on the classic infrastructure (SoftLayer) REST API
//!
//! Every call is a `POST` to
//! `{softlayer}/SoftLayer_Network_CdnMarketplace_Configuration_Mapping/{method}`
//! with the arguments in a `{"parameters": [...]}` envelope. Mappings are
//! identified by their `uniqueId`.

use crate::error::{ClientError, Result};
use crate::session::{AuthScheme, Session};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const MAPPING_SERVICE: &str = "SoftLayer_Network_CdnMarketplace_Configuration_Mapping";

/// Domain mapping as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CdnMapping {
    pub unique_id: String,
    pub domain: String,
    pub vendor_name: String,
    pub origin_host: String,
    pub origin_type: String,
    pub bucket_name: Option<String>,
    pub protocol: String,
    pub http_port: Option<i64>,
    pub https_port: Option<i64>,
    pub cname: String,
    pub header: Option<String>,
    pub respect_headers: Option<bool>,
    pub file_extension: Option<String>,
    pub certificate_type: Option<String>,
    pub cache_key_query_rule: Option<String>,
    pub performance_configuration: Option<String>,
    pub path: String,
    pub status: String,
}

/// Input for `createDomainMapping` and `updateDomainMapping`
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CdnMappingInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    pub domain: String,
    pub vendor_name: String,
    pub origin: String,
    pub origin_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// `"1"` or `"0"`
    pub respect_headers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    pub cache_key_query_rule: String,
    pub performance_configuration: String,
    pub path: String,
}

/// Client for CDN domain mappings
#[derive(Clone)]
pub struct CdnClient {
    session: Session,
    base: String,
}

impl CdnClient {
    pub fn new(session: Session) -> Self {
        let base = session.config().endpoints.softlayer.clone();
        Self { session, base }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, parameters: Value) -> Result<T> {
        let url = format!("{}/{}/{}", self.base, MAPPING_SERVICE, method);
        tracing::debug!("CDN {}", method);
        let request = self
            .session
            .http()
            .post(&url)
            .json(&json!({ "parameters": parameters }));
        self.session.json(request, AuthScheme::Bearer).await
    }

    /// Calls that answer with a list of mappings return the first one
    async fn call_one(&self, method: &str, parameters: Value, what: &str) -> Result<CdnMapping> {
        let mappings: Vec<CdnMapping> = self.call(method, parameters).await?;
        mappings
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("CDN mapping {}", what)))
    }

    pub async fn create_mapping(&self, input: &CdnMappingInput) -> Result<CdnMapping> {
        self.call_one("createDomainMapping", json!([input]), &input.domain)
            .await
    }

    /// Ask the vendor to verify the CNAME record of a mapping
    pub async fn verify_mapping(&self, unique_id: &str) -> Result<CdnMapping> {
        let id = unique_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(unique_id));
        self.call_one("verifyDomainMapping", json!([id]), unique_id)
            .await
    }

    pub async fn get_mapping(&self, unique_id: &str) -> Result<CdnMapping> {
        self.call_one("listDomainMappingByUniqueId", json!([unique_id]), unique_id)
            .await
    }

    pub async fn update_mapping(&self, input: &CdnMappingInput) -> Result<CdnMapping> {
        let what = input.unique_id.as_deref().unwrap_or(&input.domain).to_string();
        self.call_one("updateDomainMapping", json!([input]), &what)
            .await
    }

    pub async fn delete_mapping(&self, unique_id: &str) -> Result<()> {
        let _: Value = self
            .call("deleteDomainMapping", json!([unique_id]))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::test_session;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mapping_path(method: &str) -> String {
        format!("/{}/{}", MAPPING_SERVICE, method)
    }

    #[tokio::test]
    async fn test_create_sends_parameters_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(mapping_path("createDomainMapping").as_str()))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(json!({"parameters": [{
                "domain": "www.example.com",
                "vendorName": "akamai",
                "origin": "origin.example.com",
                "originType": "HOST_SERVER",
                "protocol": "HTTP",
                "httpPort": 80,
                "respectHeaders": "1",
                "cacheKeyQueryRule": "include-all",
                "performanceConfiguration": "General web delivery",
                "path": "/*"
            }]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "uniqueId": "123456",
                "domain": "www.example.com",
                "status": "CNAME_CONFIGURATION",
                "cname": "cdnakaabc.cdnedge.bluemix.net",
                "httpPort": 80,
                "respectHeaders": true
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let input = CdnMappingInput {
            domain: "www.example.com".into(),
            vendor_name: "akamai".into(),
            origin: "origin.example.com".into(),
            origin_type: "HOST_SERVER".into(),
            protocol: "HTTP".into(),
            http_port: Some(80),
            respect_headers: "1".into(),
            cache_key_query_rule: "include-all".into(),
            performance_configuration: "General web delivery".into(),
            path: "/*".into(),
            ..Default::default()
        };
        let mapping = test_session(&server).cdn().create_mapping(&input).await.unwrap();
        assert_eq!(mapping.unique_id, "123456");
        assert_eq!(mapping.status, "CNAME_CONFIGURATION");
        assert_eq!(mapping.respect_headers, Some(true));
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(mapping_path("listDomainMappingByUniqueId").as_str()))
            .and(body_json(json!({"parameters": ["42"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = test_session(&server).cdn().get_mapping("42").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_verify_sends_numeric_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(mapping_path("verifyDomainMapping").as_str()))
            .and(body_json(json!({"parameters": [42]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"uniqueId": "42", "status": "RUNNING"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mapping = test_session(&server).cdn().verify_mapping("42").await.unwrap();
        assert_eq!(mapping.status, "RUNNING");
    }
}
