//! Manifest location, client configuration and engine construction

use anyhow::Context as _;
use ibmform_client::{ClientConfig, Endpoints, IamAuthenticator, Session};
use ibmform_core::{Engine, Manifest, ProviderBlock};
use ibmform_provider::{Registry, StateManager};
use ibmform_resources::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Provider block settings understood by [`client_config`]
const PROVIDER_SETTINGS: &[&str] = &[
    "ibmcloud_api_key",
    "region",
    "resource_group",
    "ibmcloud_timeout",
    "max_retries",
    "endpoint",
];

/// Where the manifest is and where its state lives
pub struct Location {
    pub manifest_path: PathBuf,
    pub root: PathBuf,
}

impl Location {
    /// Use `file` when given, otherwise discover the manifest
    pub fn find(file: Option<&Path>) -> anyhow::Result<Self> {
        let manifest_path = match file {
            Some(path) => path.to_path_buf(),
            None => ibmform_config::find_manifest()?,
        };
        let root = ibmform_config::project_root(&manifest_path);
        Ok(Self {
            manifest_path,
            root,
        })
    }

    pub fn state_manager(&self) -> StateManager {
        StateManager::new(&self.root)
    }

    pub fn load(&self) -> anyhow::Result<Workspace> {
        let manifest = ibmform_core::parse_manifest_file(&self.manifest_path)
            .with_context(|| format!("failed to load {}", self.manifest_path.display()))?;
        Ok(Workspace {
            manifest_path: self.manifest_path.clone(),
            root: self.root.clone(),
            manifest,
        })
    }
}

/// A parsed manifest and its project root
pub struct Workspace {
    pub manifest_path: PathBuf,
    pub root: PathBuf,
    pub manifest: Manifest,
}

impl Workspace {
    /// Engine backed by an authenticated session
    pub fn engine(&self) -> anyhow::Result<Engine> {
        let config = client_config(self.manifest.provider.as_ref())?;
        let session = Session::new(config).context(
            "IBM Cloud credentials are required: set ibmcloud_api_key in the provider block or IC_API_KEY",
        )?;
        let registry = ibmform_resources::registry(Context::new(session));
        Ok(Engine::new(registry, StateManager::new(&self.root)))
    }

    /// Engine for commands that never reach the API
    pub fn offline_engine(&self) -> anyhow::Result<Engine> {
        Ok(Engine::new(offline_registry()?, StateManager::new(&self.root)))
    }
}

/// Registry whose session carries no credentials
pub fn offline_registry() -> anyhow::Result<Registry> {
    let session = Session::with_authenticator(ClientConfig::default(), IamAuthenticator::with_token(""))?;
    Ok(ibmform_resources::registry(Context::new(session)))
}

/// Client configuration from the environment, overridden by the provider block
pub fn client_config(provider: Option<&ProviderBlock>) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    let Some(provider) = provider else {
        return Ok(config);
    };

    for key in provider.settings.keys() {
        if !PROVIDER_SETTINGS.contains(&key.as_str()) {
            tracing::warn!("Ignoring unknown provider setting '{}'", key);
        }
    }

    if let Some(api_key) = provider.get_str("ibmcloud_api_key") {
        config = config.with_api_key(api_key);
    }
    if let Some(region) = provider.get_str("region") {
        config = config.with_region(region);
    }
    if let Some(resource_group) = provider.get_str("resource_group") {
        config = config.with_resource_group(resource_group);
    }
    if let Some(timeout) = setting_u64(provider, "ibmcloud_timeout")? {
        config = config.with_timeout(Duration::from_secs(timeout));
    }
    if let Some(retries) = setting_u64(provider, "max_retries")? {
        config.retry.max_attempts = u32::try_from(retries).context("max_retries is too large")?;
    }
    if let Some(endpoint) = provider.get_str("endpoint") {
        config = config.with_endpoints(Endpoints::single(endpoint));
    }
    Ok(config)
}

fn setting_u64(provider: &ProviderBlock, key: &str) -> anyhow::Result<Option<u64>> {
    match provider.settings.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .with_context(|| format!("provider setting '{}' must be a positive integer", key)),
        Some(other) => anyhow::bail!("provider setting '{}' must be a number, got {}", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn provider(settings: Value) -> ProviderBlock {
        ProviderBlock {
            name: "ibm".into(),
            settings: settings.as_object().cloned().unwrap(),
        }
    }

    #[test]
    #[serial]
    fn test_provider_block_overrides_env() {
        temp_env::with_vars(
            [
                ("IC_API_KEY", Some("env-key")),
                ("IC_REGION", Some("eu-de")),
                ("IBMCLOUD_IS_NG_API_ENDPOINT", None),
            ],
            || {
                let config = client_config(Some(&provider(json!({
                    "region": "jp-tok",
                    "resource_group": "rg-1",
                    "ibmcloud_timeout": 120,
                    "max_retries": 2
                }))))
                .unwrap();
                assert_eq!(config.api_key.as_deref(), Some("env-key"));
                assert_eq!(config.region, "jp-tok");
                assert_eq!(config.endpoints.vpc, "https://jp-tok.iaas.cloud.ibm.com/v1");
                assert_eq!(config.resource_group.as_deref(), Some("rg-1"));
                assert_eq!(config.timeout, Duration::from_secs(120));
                assert_eq!(config.retry.max_attempts, 2);
            },
        );
    }

    #[test]
    #[serial]
    fn test_without_provider_block_uses_env() {
        temp_env::with_vars(
            [("IC_REGION", None::<&str>), ("IBMCLOUD_REGION", Some("us-east"))],
            || {
                let config = client_config(None).unwrap();
                assert_eq!(config.region, "us-east");
            },
        );
    }

    #[test]
    #[serial]
    fn test_single_endpoint() {
        let config = client_config(Some(&provider(json!({"endpoint": "http://localhost:8080/"})))).unwrap();
        assert_eq!(config.endpoints.iam, "http://localhost:8080");
        assert_eq!(config.endpoints.vpc, "http://localhost:8080/v1");
    }

    #[test]
    #[serial]
    fn test_invalid_timeout() {
        let err = client_config(Some(&provider(json!({"ibmcloud_timeout": "soon"})))).unwrap_err();
        assert!(err.to_string().contains("ibmcloud_timeout"));
    }

    #[test]
    fn test_location_root() {
        let location = Location::find(Some(Path::new("/work/net/.ibmform/main.kdl"))).unwrap();
        assert_eq!(location.root, PathBuf::from("/work/net"));
    }

    #[test]
    fn test_offline_registry_has_catalog() {
        let registry = offline_registry().unwrap();
        assert!(registry.resource("ibm_is_vpc").is_ok());
        assert!(registry.data_source("ibm_is_image").is_ok());
    }
}
