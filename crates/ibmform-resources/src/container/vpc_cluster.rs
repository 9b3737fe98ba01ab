//! `ibm_container_vpc_cluster` resource

use crate::common::{self, crn_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::ContainerClient;
use ibmform_client::container::{Cluster, ClusterCreateRequest, WorkerPoolRequest, WorkerZone};
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator,
};
use serde_json::Value;
use std::time::Duration;

pub const MASTER_NODE_READY: &str = "MasterNodeReady";
pub const ONE_WORKER_NODE_READY: &str = "OneWorkerNodeReady";
pub const INGRESS_READY: &str = "IngressReady";

const DEPLOYING: &[&str] = &["deploy_requested", "deploy_in_progress"];
const DEFAULT_POOL: &str = "default";
const READY_HITS: usize = 5;

/// Cluster lookup that treats 404 as gone
async fn find_cluster(client: &ContainerClient, id: &str) -> Result<Option<Cluster>> {
    match client.get_cluster(id).await {
        Ok(cluster) => Ok(Some(cluster)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Block until the cluster reaches the `wait_till` milestone
async fn wait_till(ctx: &Context, id: &str, milestone: &str, timeout: Duration) -> Result<()> {
    let containers = ctx.container();
    let client = &containers;
    tracing::info!("Waiting for cluster {} to reach {}", id, milestone);

    let conf = |target: &[&str]| {
        ctx.state_change(DEPLOYING, target, timeout)
            .with_continuous_target_occurence(READY_HITS)
    };

    match milestone {
        MASTER_NODE_READY => {
            conf(&["ready"])
                .wait_for(move || async move {
                    let cluster = client.get_cluster(id).await.map_err(ProviderError::from)?;
                    let state = if cluster.lifecycle.master_status == "Ready" {
                        "ready"
                    } else {
                        "deploy_in_progress"
                    };
                    Ok::<_, ProviderError>((Some(cluster), state.to_string()))
                })
                .await?;
        }
        ONE_WORKER_NODE_READY => {
            conf(&["normal"])
                .wait_for(move || async move {
                    let workers = client.list_workers(id).await.map_err(ProviderError::from)?;
                    let state = if workers
                        .iter()
                        .filter(|w| w.pool_name.is_empty() || w.pool_name == DEFAULT_POOL)
                        .any(|w| w.health.state == "normal")
                    {
                        "normal"
                    } else {
                        "deploy_in_progress"
                    };
                    Ok::<_, ProviderError>((Some(workers), state.to_string()))
                })
                .await?;
        }
        _ => {
            conf(&["ready"])
                .wait_for(move || async move {
                    let cluster = client.get_cluster(id).await.map_err(ProviderError::from)?;
                    let state = if cluster.ingress.hostname.is_empty() {
                        "deploy_in_progress"
                    } else {
                        "ready"
                    };
                    Ok::<_, ProviderError>((Some(cluster), state.to_string()))
                })
                .await?;
        }
    }
    Ok(())
}

/// Whether a reported version like `1.29.3_1531` satisfies a configured `1.29`
fn version_matches(configured: &str, actual: &str) -> bool {
    actual == configured
        || actual
            .strip_prefix(configured)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('_'))
}

/// Managed Kubernetes cluster on VPC infrastructure
pub struct ContainerVpcCluster {
    ctx: Context,
}

impl ContainerVpcCluster {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    fn create_request(d: &ResourceData) -> Result<ClusterCreateRequest> {
        let zones = d
            .get_blocks("zones")
            .into_iter()
            .map(|z| {
                let field = |key: &str| {
                    z.get(key)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| ProviderError::Attribute {
                            key: format!("zones.{}", key),
                            expected: "string",
                        })
                };
                Ok(WorkerZone {
                    id: field("name")?,
                    subnet_id: field("subnet_id")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if zones.is_empty() {
            return Err(ProviderError::InvalidConfig(
                "at least one zones block is required".into(),
            ));
        }

        Ok(ClusterCreateRequest {
            name: d.require_str("name")?.to_string(),
            provider: "vpc-gen2".to_string(),
            kube_version: d.get_str("kube_version").map(str::to_string),
            pod_subnet: d.get_str("pod_subnet").map(str::to_string),
            service_subnet: d.get_str("service_subnet").map(str::to_string),
            disable_public_service_endpoint: d
                .get_bool("disable_public_service_endpoint")
                .unwrap_or(false),
            cos_instance_crn: d.get_str("cos_instance_crn").map(str::to_string),
            worker_pool: WorkerPoolRequest {
                name: DEFAULT_POOL.to_string(),
                flavor: d.require_str("flavor")?.to_string(),
                vpc_id: d.require_str("vpc_id")?.to_string(),
                worker_count: d.get_i64("worker_count").unwrap_or(1),
                zones,
            },
        })
    }

    async fn wait_for_version(&self, id: &str, version: &str, timeout: Duration) -> Result<()> {
        let containers = self.ctx.container();
        let client = &containers;
        self.ctx
            .state_change(&["version_updating"], &["normal"], timeout)
            .wait_for(move || async move {
                let cluster = client.get_cluster(id).await.map_err(ProviderError::from)?;
                let state = if version_matches(version, &cluster.master_kube_version)
                    && cluster.state == "normal"
                {
                    "normal"
                } else {
                    "version_updating"
                };
                Ok::<_, ProviderError>((Some(cluster), state.to_string()))
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for ContainerVpcCluster {
    fn type_name(&self) -> &'static str {
        "ibm_container_vpc_cluster"
    }

    fn schema(&self) -> Schema {
        let zone = Schema::new()
            .attr("name", Attribute::string().required())
            .attr("subnet_id", Attribute::string().required());

        Schema::new()
            .attr("name", Attribute::string().required().force_new())
            .attr("vpc_id", Attribute::string().required().force_new())
            .attr(
                "flavor",
                Attribute::string()
                    .required()
                    .force_new()
                    .describe("Worker machine type, e.g. bx2.4x16"),
            )
            .attr("zones", Attribute::block(zone).required().force_new())
            .attr(
                "kube_version",
                Attribute::string()
                    .optional()
                    .computed()
                    .describe("Changing it updates the master"),
            )
            .attr(
                "worker_count",
                Attribute::int()
                    .optional()
                    .default(1)
                    .validate(Validator::IntBetween(1, 1000))
                    .describe("Workers per zone in the default pool"),
            )
            .attr(
                "disable_public_service_endpoint",
                Attribute::bool().optional().force_new().default(false),
            )
            .attr("pod_subnet", Attribute::string().optional().computed().force_new())
            .attr(
                "service_subnet",
                Attribute::string().optional().computed().force_new(),
            )
            .attr("cos_instance_crn", Attribute::string().optional().force_new())
            .attr(
                "wait_till",
                Attribute::string()
                    .optional()
                    .apply_once()
                    .default(INGRESS_READY)
                    .validate(Validator::OneOf(&[
                        MASTER_NODE_READY,
                        ONE_WORKER_NODE_READY,
                        INGRESS_READY,
                    ])),
            )
            .attr("tags", tags_attr())
            .attr("resource_group_id", Attribute::string().computed())
            .attr("state", Attribute::string().computed())
            .attr("master_status", Attribute::string().computed())
            .attr("master_url", Attribute::string().computed())
            .attr("ingress_hostname", Attribute::string().computed())
            .attr("ingress_secret", Attribute::string().computed().sensitive())
            .attr("public_service_endpoint_url", Attribute::string().computed())
            .attr("private_service_endpoint_url", Attribute::string().computed())
            .attr("crn", crn_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(90, 90, 45)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let request = Self::create_request(d)?;
        let id = self.ctx.container().create_cluster(&request).await?;
        tracing::info!("Created cluster {} ({})", request.name, id);
        d.set_id(id.as_str());

        let milestone = d.get_str("wait_till").unwrap_or(INGRESS_READY).to_string();
        wait_till(&self.ctx, &id, &milestone, d.timeout(Operation::Create)).await?;

        let cluster = self.ctx.container().get_cluster(&id).await?;
        common::apply_tags(&self.ctx, d, &cluster.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let Some(cluster) = find_cluster(&self.ctx.container(), d.id()).await? else {
            tracing::warn!("Cluster {} not found, removing from state", d.id());
            d.clear_id();
            return Ok(());
        };

        d.set("name", cluster.name.as_str());
        if let Some(vpc) = cluster.vpcs.first() {
            d.set("vpc_id", vpc.as_str());
        }
        let keep_version = d
            .get_str("kube_version")
            .is_some_and(|v| version_matches(v, &cluster.master_kube_version));
        if !keep_version {
            d.set("kube_version", cluster.master_kube_version.as_str());
        }
        let zone_count = d.get_blocks("zones").len().max(1) as i64;
        if cluster.worker_count > 0 {
            d.set("worker_count", cluster.worker_count / zone_count);
        }
        d.set(
            "disable_public_service_endpoint",
            !cluster.service_endpoints.public_service_endpoint_enabled,
        );
        d.set("resource_group_id", cluster.resource_group.as_str());
        d.set("state", cluster.state.as_str());
        d.set("master_status", cluster.lifecycle.master_status.as_str());
        d.set("master_url", cluster.master_url.as_str());
        d.set("ingress_hostname", cluster.ingress.hostname.as_str());
        d.set("ingress_secret", cluster.ingress.secret_name.as_str());
        d.set(
            "public_service_endpoint_url",
            cluster.service_endpoints.public_service_endpoint_url.as_str(),
        );
        d.set(
            "private_service_endpoint_url",
            cluster.service_endpoints.private_service_endpoint_url.as_str(),
        );
        d.set("crn", cluster.crn.as_str());
        common::read_tags(&self.ctx, d, &cluster.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let timeout = d.timeout(Operation::Update);

        if d.has_change("kube_version") {
            if let Some(version) = d.get_str("kube_version").map(str::to_string) {
                tracing::info!("Updating cluster {} master to {}", id, version);
                self.ctx.container().update_master_version(&id, &version).await?;
                self.wait_for_version(&id, &version, timeout).await?;
            }
        }
        if d.has_change("worker_count") {
            let size = d.require_i64("worker_count")?;
            tracing::info!("Resizing {} pool of cluster {} to {}", DEFAULT_POOL, id, size);
            self.ctx
                .container()
                .resize_worker_pool(&id, DEFAULT_POOL, size)
                .await?;
        }
        if d.has_change("tags") {
            let crn = d.require_str("crn")?.to_string();
            common::apply_tags(&self.ctx, d, &crn).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let containers = self.ctx.container();
        match containers.delete_cluster(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let client = &containers;
        let cluster_id = id.as_str();
        self.ctx
            .state_change(&["deleting"], &[], d.timeout(Operation::Delete))
            .wait_for(move || async move {
                let cluster = find_cluster(client, cluster_id).await?;
                let state = if cluster.is_some() { "deleting" } else { "" };
                Ok::<_, ProviderError>((cluster, state.to_string()))
            })
            .await?;
        tracing::info!("Deleted cluster {}", id);
        d.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, mount_tags, obj, offline_context};
    use serde_json::{Map, json};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(wait_till: &str) -> Map<String, Value> {
        obj(json!({
            "name": "k8s",
            "vpc_id": "r006-vpc",
            "flavor": "bx2.4x16",
            "zones": [{"name": "us-south-1", "subnet_id": "s-1"}],
            "worker_count": 2,
            "wait_till": wait_till
        }))
    }

    fn cluster_body(master_status: &str, ingress: &str) -> Value {
        json!({
            "id": "c-1",
            "name": "k8s",
            "crn": "crn:v1:containers-kubernetes:c-1",
            "state": "normal",
            "resourceGroup": "rg-default",
            "masterKubeVersion": "1.29.3_1531",
            "masterURL": "https://c-1.us-south.containers.cloud.ibm.com:30000",
            "workerCount": 2,
            "vpcs": ["r006-vpc"],
            "lifecycle": {"masterStatus": master_status},
            "ingress": {"hostname": ingress, "secretName": "k8s-secret"},
            "serviceEndpoints": {"publicServiceEndpointEnabled": true}
        })
    }

    async fn mount_create(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/global/v2/vpc/createCluster"))
            .and(body_json(json!({
                "name": "k8s",
                "provider": "vpc-gen2",
                "disablePublicServiceEndpoint": false,
                "workerPool": {
                    "name": "default",
                    "flavor": "bx2.4x16",
                    "vpcID": "r006-vpc",
                    "workerCount": 2,
                    "zones": [{"id": "us-south-1", "subnetID": "s-1"}]
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"clusterID": "c-1"})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_version_matches() {
        assert!(version_matches("1.29", "1.29.3_1531"));
        assert!(version_matches("1.29.3_1531", "1.29.3_1531"));
        assert!(!version_matches("1.2", "1.29.3_1531"));
        assert!(!version_matches("1.30", "1.29.3_1531"));
    }

    #[test]
    fn test_cluster_timeouts() {
        let res = ContainerVpcCluster::new(offline_context());
        assert_eq!(res.timeouts().get(Operation::Create).as_secs(), 90 * 60);
        assert_eq!(res.timeouts().get(Operation::Delete).as_secs(), 45 * 60);
    }

    #[tokio::test]
    async fn test_master_ready_needs_consecutive_hits() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        mount_create(&server).await;
        Mock::given(method("GET"))
            .and(path("/global/v2/getCluster"))
            .and(query_param("cluster", "c-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_body("Deploying", "")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/global/v2/getCluster"))
            .and(query_param("cluster", "c-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_body("Ready", "")))
            .expect(7..)
            .mount(&server)
            .await;

        let res = ContainerVpcCluster::new(context(&server));
        let mut d = ResourceData::new(config(MASTER_NODE_READY));
        res.create(&mut d).await.unwrap();

        assert_eq!(d.id(), "c-1");
        assert_eq!(d.get_str("master_status"), Some("Ready"));
        assert_eq!(d.get_i64("worker_count"), Some(2));
        assert_eq!(d.get_str("kube_version"), Some("1.29.3_1531"));
    }

    #[tokio::test]
    async fn test_one_worker_ready() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        mount_create(&server).await;
        Mock::given(method("GET"))
            .and(path("/global/v2/vpc/getWorkers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "w-1", "poolName": "default", "health": {"state": "normal"}},
                {"id": "w-2", "poolName": "default", "health": {"state": "warning"}}
            ])))
            .expect(5)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/global/v2/getCluster"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_body("Ready", "")))
            .mount(&server)
            .await;

        let res = ContainerVpcCluster::new(context(&server));
        let mut d = ResourceData::new(config(ONE_WORKER_NODE_READY));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.get_str("state"), Some("normal"));
    }

    #[tokio::test]
    async fn test_worker_count_change_resizes_default_pool() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(path("/global/v2/resizeWorkerPool"))
            .and(body_json(json!({"cluster": "c-1", "workerpool": "default", "size": 3})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/global/v2/getCluster"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_body("Ready", "k8s.example")))
            .mount(&server)
            .await;

        let prior = config(INGRESS_READY);
        let mut planned = prior.clone();
        planned.insert("worker_count".into(), json!(3));
        let mut d = ResourceData::for_update("c-1", prior, planned);
        ContainerVpcCluster::new(context(&server))
            .update(&mut d)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/global/v1/clusters/c-1"))
            .and(query_param("deleteResources", "true"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/global/v2/getCluster"))
            .respond_with(ResponseTemplate::new(200).set_body_json(cluster_body("Ready", "")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/global/v2/getCluster"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let res = ContainerVpcCluster::new(context(&server));
        let mut d = ResourceData::from_state("c-1", Map::new());
        res.delete(&mut d).await.unwrap();
        assert_eq!(d.id(), "");
    }
}
