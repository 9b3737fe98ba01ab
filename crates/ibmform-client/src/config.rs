//! Client configuration and endpoint resolution

use crate::error::{ClientError, Result};
use ibmform_provider::RetryConfig;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-south";
pub const DEFAULT_VPC_API_VERSION: &str = "2024-04-30";

const API_KEY_VARS: &[&str] = &["IC_API_KEY", "IBMCLOUD_API_KEY"];
const REGION_VARS: &[&str] = &["IC_REGION", "IBMCLOUD_REGION", "BM_REGION", "BLUEMIX_REGION"];
const RESOURCE_GROUP_VARS: &[&str] = &["IC_RESOURCE_GROUP", "IBMCLOUD_RESOURCE_GROUP"];
const TIMEOUT_VARS: &[&str] = &["IC_TIMEOUT", "IBMCLOUD_TIMEOUT"];
const MAX_RETRIES_VARS: &[&str] = &["MAX_RETRIES"];

/// First non-empty value among the given environment variables
pub fn env_fallback(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

/// Service endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub iam: String,
    pub vpc: String,
    pub cis: String,
    pub containers: String,
    pub tagging: String,
    /// Classic infrastructure REST API, used for CDN mappings
    pub softlayer: String,
}

impl Endpoints {
    /// Public endpoints for a region, with environment overrides
    pub fn resolve(region: &str) -> Self {
        let pick = |var: &str, default: String| {
            env_fallback(&[var])
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default)
        };
        Self {
            iam: pick("IBMCLOUD_IAM_API_ENDPOINT", "https://iam.cloud.ibm.com".into()),
            vpc: pick(
                "IBMCLOUD_IS_NG_API_ENDPOINT",
                format!("https://{}.iaas.cloud.ibm.com/v1", region),
            ),
            cis: pick("IBMCLOUD_CIS_API_ENDPOINT", "https://api.cis.cloud.ibm.com".into()),
            containers: pick("IBMCLOUD_CS_API_ENDPOINT", "https://containers.cloud.ibm.com".into()),
            tagging: pick(
                "IBMCLOUD_GT_API_ENDPOINT",
                "https://tags.global-search-tagging.cloud.ibm.com".into(),
            ),
            softlayer: pick(
                "SOFTLAYER_ENDPOINT_URL",
                "https://api.softlayer.com/rest/v3.1".into(),
            ),
        }
    }

    /// Every service served from one base URL
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            iam: base.to_string(),
            vpc: format!("{}/v1", base),
            cis: base.to_string(),
            containers: base.to_string(),
            tagging: base.to_string(),
            softlayer: base.to_string(),
        }
    }
}

/// Configuration shared by all IBM Cloud clients
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub region: String,
    pub resource_group: Option<String>,
    pub timeout: Duration,
    pub retry: RetryConfig,
    pub vpc_api_version: String,
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            region: DEFAULT_REGION.to_string(),
            resource_group: None,
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
            vpc_api_version: DEFAULT_VPC_API_VERSION.to_string(),
            endpoints: Endpoints::resolve(DEFAULT_REGION),
        }
    }
}

impl ClientConfig {
    /// Build configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let region = env_fallback(REGION_VARS).unwrap_or_else(|| DEFAULT_REGION.to_string());

        let timeout = match env_fallback(TIMEOUT_VARS) {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                ClientError::InvalidConfig(format!("timeout '{}' is not a number of seconds", raw))
            })?),
            None => Duration::from_secs(60),
        };

        let mut retry = RetryConfig::default();
        if let Some(raw) = env_fallback(MAX_RETRIES_VARS) {
            retry.max_attempts = raw.parse().map_err(|_| {
                ClientError::InvalidConfig(format!("MAX_RETRIES '{}' is not a number", raw))
            })?;
        }

        Ok(Self {
            api_key: env_fallback(API_KEY_VARS),
            endpoints: Endpoints::resolve(&region),
            region,
            resource_group: env_fallback(RESOURCE_GROUP_VARS),
            timeout,
            retry,
            vpc_api_version: DEFAULT_VPC_API_VERSION.to_string(),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Change region and re-resolve the regional endpoints
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self.endpoints = Endpoints::resolve(&self.region);
        self
    }

    pub fn with_resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = Some(resource_group.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ClientError::MissingCredentials(API_KEY_VARS.join(" or ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_fallbacks() {
        temp_env::with_vars(
            [
                ("IC_API_KEY", None),
                ("IBMCLOUD_API_KEY", Some("key-2")),
                ("IC_REGION", Some("")),
                ("IBMCLOUD_REGION", Some("eu-de")),
                ("IBMCLOUD_IS_NG_API_ENDPOINT", None),
                ("IC_TIMEOUT", Some("120")),
            ],
            || {
                let config = ClientConfig::from_env().unwrap();
                assert_eq!(config.api_key.as_deref(), Some("key-2"));
                assert_eq!(config.region, "eu-de");
                assert_eq!(config.endpoints.vpc, "https://eu-de.iaas.cloud.ibm.com/v1");
                assert_eq!(config.timeout, Duration::from_secs(120));
            },
        );
    }

    #[test]
    #[serial]
    fn test_endpoint_override() {
        temp_env::with_vars(
            [
                ("IBMCLOUD_IS_NG_API_ENDPOINT", Some("https://private.vpc.example/v1/")),
                ("IBMCLOUD_IAM_API_ENDPOINT", Some("https://private.iam.example")),
                ("SOFTLAYER_ENDPOINT_URL", None),
            ],
            || {
                let endpoints = Endpoints::resolve("us-south");
                assert_eq!(endpoints.vpc, "https://private.vpc.example/v1");
                assert_eq!(endpoints.iam, "https://private.iam.example");
                assert_eq!(endpoints.softlayer, "https://api.softlayer.com/rest/v3.1");
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        temp_env::with_vars(
            [("IC_API_KEY", None::<&str>), ("IBMCLOUD_API_KEY", None)],
            || {
                let config = ClientConfig::from_env().unwrap();
                let err = config.require_api_key().unwrap_err();
                assert!(err.to_string().contains("IC_API_KEY"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_invalid_timeout() {
        temp_env::with_var("IC_TIMEOUT", Some("soon"), || {
            assert!(ClientConfig::from_env().is_err());
        });
    }
}
