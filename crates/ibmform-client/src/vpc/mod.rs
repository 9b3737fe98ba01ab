//! VPC Infrastructure API client
//!
//! Every request carries the `version` and `generation=2` query parameters.
//! Updates are JSON merge patches.

pub mod models;

pub use models::*;

use crate::error::{ClientError, Result};
use crate::session::{AuthScheme, Session};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const PAGE_LIMIT: &str = "50";

/// Collection paths
pub mod paths {
    pub const VPCS: &str = "/vpcs";
    pub const SUBNETS: &str = "/subnets";
    pub const PUBLIC_GATEWAYS: &str = "/public_gateways";
    pub const FLOATING_IPS: &str = "/floating_ips";
    pub const KEYS: &str = "/keys";
    pub const SECURITY_GROUPS: &str = "/security_groups";
    pub const VOLUMES: &str = "/volumes";
    pub const INSTANCES: &str = "/instances";
    pub const DEDICATED_HOST_GROUPS: &str = "/dedicated_host/groups";
    pub const DEDICATED_HOSTS: &str = "/dedicated_hosts";
    pub const DEDICATED_HOST_PROFILES: &str = "/dedicated_host/profiles";
    pub const INSTANCE_TEMPLATES: &str = "/instance/templates";
    pub const VPN_GATEWAYS: &str = "/vpn_gateways";
    pub const LOAD_BALANCERS: &str = "/load_balancers";
    pub const IMAGES: &str = "/images";
}

/// Client for the regional VPC API
#[derive(Clone)]
pub struct VpcClient {
    session: Session,
    base: String,
    version: String,
}

impl VpcClient {
    pub fn new(session: Session) -> Self {
        let base = session.config().endpoints.vpc.clone();
        let version = session.config().vpc_api_version.clone();
        Self {
            session,
            base,
            version,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn query(&self) -> [(&str, &str); 2] {
        [("version", self.version.as_str()), ("generation", "2")]
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("VPC GET {}", path);
        let request = self.session.http().get(self.url(path)).query(&self.query());
        self.session.json(request, AuthScheme::Bearer).await
    }

    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        tracing::debug!("VPC POST {}", path);
        let request = self
            .session
            .http()
            .post(self.url(path))
            .query(&self.query())
            .json(body);
        self.session.json(request, AuthScheme::Bearer).await
    }

    /// JSON merge patch
    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, patch: &B) -> Result<T> {
        tracing::debug!("VPC PATCH {}", path);
        let body = serde_json::to_vec(patch)?;
        let request = self
            .session
            .http()
            .patch(self.url(path))
            .query(&self.query())
            .header("Content-Type", "application/merge-patch+json")
            .body(body);
        self.session.json(request, AuthScheme::Bearer).await
    }

    /// PUT returning a body (e.g. attaching a public gateway to a subnet)
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        tracing::debug!("VPC PUT {}", path);
        let request = self
            .session
            .http()
            .put(self.url(path))
            .query(&self.query())
            .json(body);
        self.session.json(request, AuthScheme::Bearer).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        tracing::debug!("VPC DELETE {}", path);
        let request = self.session.http().delete(self.url(path)).query(&self.query());
        self.session.empty(request, AuthScheme::Bearer).await
    }

    /// Fetch one object, mapping a 404 to `None`
    pub async fn find<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path).await {
            Ok(v) => Ok(Some(v)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch every page of a collection
    ///
    /// Pages are chained through `next.href`; only its `start` token is
    /// carried over.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        items_key: &str,
        filters: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let mut request = self
                .session
                .http()
                .get(self.url(path))
                .query(&self.query())
                .query(&[("limit", PAGE_LIMIT)])
                .query(filters);
            if let Some(token) = &start {
                request = request.query(&[("start", token.as_str())]);
            }

            let mut page: Value = self.session.json(request, AuthScheme::Bearer).await?;
            if let Some(Value::Array(batch)) = page.get_mut(items_key).map(Value::take) {
                for item in batch {
                    items.push(serde_json::from_value(item)?);
                }
            }

            start = page
                .get("next")
                .and_then(|n| n.get("href"))
                .and_then(Value::as_str)
                .and_then(start_token);
            if start.is_none() {
                break;
            }
            tracing::debug!("Following pagination for {}", path);
        }

        Ok(items)
    }

    pub async fn instance_action(&self, instance_id: &str, action: &str, force: bool) -> Result<()> {
        let _: Value = self
            .create(
                &format!("{}/{}/actions", paths::INSTANCES, instance_id),
                &serde_json::json!({ "type": action, "force": force }),
            )
            .await?;
        Ok(())
    }

    pub async fn set_subnet_public_gateway(&self, subnet_id: &str, gateway_id: &str) -> Result<Reference> {
        self.put(
            &format!("{}/{}/public_gateway", paths::SUBNETS, subnet_id),
            &IdRef::new(gateway_id),
        )
        .await
    }

    pub async fn unset_subnet_public_gateway(&self, subnet_id: &str) -> Result<()> {
        self.delete(&format!("{}/{}/public_gateway", paths::SUBNETS, subnet_id))
            .await
    }
}

fn start_token(href: &str) -> Option<String> {
    let query = href.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "start")
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}
