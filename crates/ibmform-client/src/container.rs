//! IBM Cloud Kubernetes Service client (VPC clusters)

use crate::error::{ClientError, Result};
use crate::session::{AuthScheme, Session};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCreateRequest {
    pub name: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_subnet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_subnet: Option<String>,
    pub disable_public_service_endpoint: bool,
    #[serde(rename = "cosInstanceCRN", skip_serializing_if = "Option::is_none")]
    pub cos_instance_crn: Option<String>,
    pub worker_pool: WorkerPoolRequest,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPoolRequest {
    pub name: String,
    pub flavor: String,
    #[serde(rename = "vpcID")]
    pub vpc_id: String,
    pub worker_count: i64,
    pub zones: Vec<WorkerZone>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerZone {
    pub id: String,
    #[serde(rename = "subnetID")]
    pub subnet_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterCreateResponse {
    #[serde(rename = "clusterID")]
    cluster_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub crn: String,
    pub region: String,
    pub resource_group: String,
    pub state: String,
    pub master_kube_version: String,
    #[serde(rename = "masterURL")]
    pub master_url: String,
    pub worker_count: i64,
    pub lifecycle: ClusterLifecycle,
    pub ingress: ClusterIngress,
    pub service_endpoints: ServiceEndpoints,
    pub vpcs: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterLifecycle {
    pub master_status: String,
    pub master_state: String,
    pub master_health: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterIngress {
    pub hostname: String,
    pub secret_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceEndpoints {
    pub public_service_endpoint_enabled: bool,
    pub private_service_endpoint_enabled: bool,
    #[serde(rename = "publicServiceEndpointURL")]
    pub public_service_endpoint_url: String,
    #[serde(rename = "privateServiceEndpointURL")]
    pub private_service_endpoint_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Worker {
    pub id: String,
    #[serde(rename = "poolID")]
    pub pool_id: String,
    pub pool_name: String,
    pub health: WorkerHealth,
    pub lifecycle: WorkerLifecycle,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerHealth {
    pub state: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerLifecycle {
    pub actual_state: String,
    pub desired_state: String,
}

/// Client for the Kubernetes Service global API
#[derive(Clone)]
pub struct ContainerClient {
    session: Session,
    base: String,
}

impl ContainerClient {
    pub fn new(session: Session) -> Self {
        let base = session.config().endpoints.containers.clone();
        Self { session, base }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        tracing::debug!("Containers {} {}", method, path);
        let mut request = self
            .session
            .http()
            .request(method, format!("{}{}", self.base, path));
        if let Some(rg) = &self.session.config().resource_group {
            request = request.header("X-Auth-Resource-Group", rg);
        }
        request
    }

    pub async fn create_cluster(&self, body: &ClusterCreateRequest) -> Result<String> {
        let request = self
            .request(reqwest::Method::POST, "/global/v2/vpc/createCluster")
            .json(body);
        let created: ClusterCreateResponse = self.session.json(request, AuthScheme::Bearer).await?;
        Ok(created.cluster_id)
    }

    pub async fn get_cluster(&self, cluster: &str) -> Result<Cluster> {
        let request = self
            .request(reqwest::Method::GET, "/global/v2/getCluster")
            .query(&[("cluster", cluster)]);
        self.session.json(request, AuthScheme::Bearer).await
    }

    pub async fn list_workers(&self, cluster: &str) -> Result<Vec<Worker>> {
        let request = self
            .request(reqwest::Method::GET, "/global/v2/vpc/getWorkers")
            .query(&[("cluster", cluster)]);
        self.session.json(request, AuthScheme::Bearer).await
    }

    /// Delete the cluster together with its persistent storage
    pub async fn delete_cluster(&self, cluster: &str) -> Result<()> {
        let request = self
            .request(reqwest::Method::DELETE, &format!("/global/v1/clusters/{}", cluster))
            .query(&[("deleteResources", "true")]);
        self.session.empty(request, AuthScheme::Bearer).await
    }

    pub async fn resize_worker_pool(&self, cluster: &str, pool: &str, size: i64) -> Result<()> {
        if size < 1 {
            return Err(ClientError::InvalidConfig(format!(
                "worker pool size must be at least 1, got {}",
                size
            )));
        }
        let request = self
            .request(reqwest::Method::POST, "/global/v2/resizeWorkerPool")
            .json(&json!({ "cluster": cluster, "workerpool": pool, "size": size }));
        self.session.empty(request, AuthScheme::Bearer).await
    }

    pub async fn update_master_version(&self, cluster: &str, version: &str) -> Result<()> {
        let request = self
            .request(reqwest::Method::PUT, &format!("/global/v1/clusters/{}", cluster))
            .json(&json!({ "action": "update", "force": true, "version": version }));
        self.session.empty(request, AuthScheme::Bearer).await
    }
}
