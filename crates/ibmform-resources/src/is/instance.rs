//! `ibm_is_instance` resource and data source

use crate::common::{self, crn_attr, resource_group_attr, status_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{
    IdRef, Instance, InstancePrototype, NameRef, NetworkInterface, NetworkInterfacePrototype,
    VolumeAttachmentPrototype, paths,
};
use ibmform_provider::flex::expand_strings;
use ibmform_provider::{
    Attribute, DataSource, Operation, ProviderError, Resource, ResourceData, Result, Schema,
    Timeouts, Validator,
};
use serde_json::{Map, Value, json};
use std::time::Duration;

const STARTING: &[&str] = &["pending", "starting", "stopped"];
const STOPPING: &[&str] = &["pending", "running", "stopping"];
const RUNNING: &[&str] = &["running", "failed"];
const STOPPED: &[&str] = &["stopped", "failed"];

fn path(id: &str) -> String {
    format!("{}/{}", paths::INSTANCES, id)
}

fn status_of(instance: &Instance) -> &str {
    &instance.status
}

pub(super) fn interface_schema() -> Schema {
    Schema::new()
        .attr("id", Attribute::string().computed())
        .attr("name", Attribute::string().optional().computed())
        .attr("subnet", Attribute::string().required())
        .attr(
            "primary_ipv4_address",
            Attribute::string().optional().computed(),
        )
        .attr("security_groups", Attribute::string_set().optional().computed())
}

pub(super) fn expand_interface(block: &Map<String, Value>) -> Result<NetworkInterfacePrototype> {
    let subnet = block
        .get("subnet")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::Attribute {
            key: "primary_network_interface.subnet".into(),
            expected: "string",
        })?;
    let non_empty = |key: &str| {
        block
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Ok(NetworkInterfacePrototype {
        name: non_empty("name"),
        subnet: IdRef::new(subnet),
        primary_ipv4_address: non_empty("primary_ipv4_address"),
        security_groups: expand_strings(block.get("security_groups"))
            .into_iter()
            .map(IdRef::new)
            .collect(),
    })
}

fn flatten_interface(nic: &NetworkInterface) -> Value {
    let mut groups: Vec<String> = nic.security_groups.iter().map(|g| g.id.clone()).collect();
    groups.sort();
    json!({
        "id": nic.id,
        "name": nic.name,
        "subnet": nic.subnet.id,
        "primary_ipv4_address": nic.ipv4_address(),
        "security_groups": groups,
    })
}

fn set_instance(d: &mut ResourceData, instance: &Instance) {
    d.set("name", instance.name.as_str());
    d.set("profile", instance.profile.name.as_str());
    d.set("vpc", instance.vpc.id.as_str());
    d.set("zone", instance.zone.name.as_str());
    if let Some(image) = &instance.image {
        d.set("image", image.id.as_str());
    }
    d.set("memory", instance.memory);
    d.set(
        "vcpu",
        instance
            .vcpu
            .as_ref()
            .map(|v| json!([{"architecture": v.architecture, "count": v.count}])),
    );
    if let Some(primary) = &instance.primary_network_interface {
        d.set("primary_network_interface", json!([flatten_interface(primary)]));
    }
    let primary_id = instance
        .primary_network_interface
        .as_ref()
        .map(|n| n.id.as_str());
    let secondary: Vec<Value> = instance
        .network_interfaces
        .iter()
        .filter(|n| Some(n.id.as_str()) != primary_id)
        .map(flatten_interface)
        .collect();
    d.set("network_interfaces", secondary);
    d.set(
        "boot_volume",
        instance.boot_volume_attachment.as_ref().map(|a| {
            json!([{
                "name": a.name,
                "volume_id": a.volume.as_ref().map(|v| v.id.clone()),
            }])
        }),
    );
    d.set(
        "dedicated_host",
        instance.dedicated_host.as_ref().map(|h| h.id.clone()),
    );
    d.set("resource_group", instance.resource_group.id.as_str());
    d.set("status", instance.status.as_str());
    d.set("crn", instance.crn.as_str());
}

/// Virtual server instance
pub struct IsInstance {
    ctx: Context,
}

impl IsInstance {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    async fn wait(&self, id: &str, pending: &[&str], target: &[&str], timeout: Duration) -> Result<Instance> {
        common::wait_for_state(&self.ctx, &path(id), pending, target, timeout, status_of).await
    }

    /// Stop, change the profile, then start again
    async fn resize(&self, id: &str, profile: &str, timeout: Duration) -> Result<()> {
        let vpc = self.ctx.vpc();
        tracing::info!("Stopping instance {} to change profile to {}", id, profile);
        vpc.instance_action(id, "stop", true).await?;
        self.wait(id, STOPPING, STOPPED, timeout).await?;

        let _: Instance = vpc
            .update(&path(id), &json!({"profile": {"name": profile}}))
            .await?;

        vpc.instance_action(id, "start", false).await?;
        self.wait(id, STARTING, RUNNING, timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for IsInstance {
    fn type_name(&self) -> &'static str {
        "ibm_is_instance"
    }

    fn schema(&self) -> Schema {
        let vcpu = Schema::new()
            .attr("architecture", Attribute::string().computed())
            .attr("count", Attribute::int().computed());
        let boot_volume = Schema::new()
            .attr("name", Attribute::string().computed())
            .attr("volume_id", Attribute::string().computed());

        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr("vpc", Attribute::string().required().force_new())
            .attr("zone", Attribute::string().required().force_new())
            .attr("image", Attribute::string().required().force_new())
            .attr(
                "profile",
                Attribute::string()
                    .required()
                    .describe("Instance profile; changing it stops and restarts the instance"),
            )
            .attr("keys", Attribute::string_set().required().force_new())
            .attr(
                "primary_network_interface",
                Attribute::block(interface_schema())
                    .required()
                    .force_new()
                    .max_items(1),
            )
            .attr(
                "network_interfaces",
                Attribute::block(interface_schema()).optional().computed().force_new(),
            )
            .attr(
                "volumes",
                Attribute::string_set()
                    .optional()
                    .force_new()
                    .describe("Data volumes attached at creation"),
            )
            .attr("user_data", Attribute::string().optional().force_new())
            .attr(
                "dedicated_host",
                Attribute::string()
                    .optional()
                    .computed()
                    .force_new()
                    .describe("Dedicated host the instance is placed on"),
            )
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("memory", Attribute::int().computed())
            .attr("vcpu", Attribute::block(vcpu).computed())
            .attr("boot_volume", Attribute::block(boot_volume).computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(30, 30, 30)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let primary = d.get_block("primary_network_interface").ok_or_else(|| {
            ProviderError::Attribute {
                key: "primary_network_interface".into(),
                expected: "block",
            }
        })?;
        let primary = expand_interface(primary)?;
        let network_interfaces = d
            .get_blocks("network_interfaces")
            .into_iter()
            .map(expand_interface)
            .collect::<Result<Vec<_>>>()?;

        let body = InstancePrototype {
            name: d.require_str("name")?.to_string(),
            profile: NameRef::new(d.require_str("profile")?),
            vpc: IdRef::new(d.require_str("vpc")?),
            zone: NameRef::new(d.require_str("zone")?),
            image: IdRef::new(d.require_str("image")?),
            keys: d.get_string_list("keys").into_iter().map(IdRef::new).collect(),
            primary_network_interface: primary,
            network_interfaces,
            volume_attachments: d
                .get_string_list("volumes")
                .into_iter()
                .map(|volume| VolumeAttachmentPrototype {
                    volume: IdRef::new(volume),
                    delete_volume_on_instance_delete: false,
                })
                .collect(),
            user_data: d.get_str("user_data").map(str::to_string),
            placement_target: d.get_str("dedicated_host").map(IdRef::new),
            resource_group: common::resource_group(&self.ctx, d),
        };

        let instance: Instance = self.ctx.vpc().create(paths::INSTANCES, &body).await?;
        tracing::info!("Created instance {} ({})", instance.name, instance.id);
        d.set_id(instance.id.as_str());

        let instance = self
            .wait(&instance.id, STARTING, RUNNING, d.timeout(Operation::Create))
            .await?;
        common::apply_tags(&self.ctx, d, &instance.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(instance) = common::read_or_clear::<Instance>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        set_instance(d, &instance);
        common::read_tags(&self.ctx, d, &instance.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        if d.has_change("name") {
            let _: Instance = self
                .ctx
                .vpc()
                .update(&path(&id), &json!({"name": d.require_str("name")?}))
                .await?;
        }
        if d.has_change("profile") {
            let profile = d.require_str("profile")?.to_string();
            self.resize(&id, &profile, d.timeout(Operation::Update)).await?;
        }
        if d.has_change("tags") {
            let crn = d.require_str("crn")?.to_string();
            common::apply_tags(&self.ctx, d, &crn).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let path = path(d.id());
        if common::delete_vpc_object(&self.ctx, &path).await? {
            common::wait_for_deleted(&self.ctx, &path, d.timeout(Operation::Delete), status_of)
                .await?;
        }
        d.clear_id();
        Ok(())
    }
}

/// Look up an instance by name
pub struct IsInstanceData {
    ctx: Context,
}

impl IsInstanceData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsInstanceData {
    fn type_name(&self) -> &'static str {
        "ibm_is_instance"
    }

    fn schema(&self) -> Schema {
        let computed_block = |schema: Schema| Attribute::block(schema).computed();
        Schema::new()
            .attr("name", Attribute::string().required())
            .attr("profile", Attribute::string().computed())
            .attr("vpc", Attribute::string().computed())
            .attr("zone", Attribute::string().computed())
            .attr("image", Attribute::string().computed())
            .attr("memory", Attribute::int().computed())
            .attr(
                "vcpu",
                computed_block(
                    Schema::new()
                        .attr("architecture", Attribute::string().computed())
                        .attr("count", Attribute::int().computed()),
                ),
            )
            .attr("primary_network_interface", computed_block(interface_schema()))
            .attr("network_interfaces", computed_block(interface_schema()))
            .attr(
                "boot_volume",
                computed_block(
                    Schema::new()
                        .attr("name", Attribute::string().computed())
                        .attr("volume_id", Attribute::string().computed()),
                ),
            )
            .attr("dedicated_host", Attribute::string().computed())
            .attr("resource_group", Attribute::string().computed())
            .attr("tags", Attribute::string_set().computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let name = d.require_str("name")?.to_string();
        let instance = self
            .ctx
            .vpc()
            .list_all::<Instance>(paths::INSTANCES, "instances", &[("name", name.as_str())])
            .await?
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ProviderError::ResourceNotFound(format!("instance '{}'", name)))?;

        d.set_id(instance.id.as_str());
        set_instance(d, &instance);
        common::read_tags(&self.ctx, d, &instance.crn).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, mount_tags, obj};
    use wiremock::matchers::{body_json, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn instance_body(status: &str, profile: &str) -> Value {
        json!({
            "id": "i-1",
            "crn": "crn:v1:instance:i-1",
            "name": "web-1",
            "status": status,
            "profile": {"name": profile},
            "vpc": {"id": "r006-vpc"},
            "zone": {"name": "us-south-1"},
            "image": {"id": "img-1"},
            "memory": 8,
            "vcpu": {"architecture": "amd64", "count": 2},
            "primary_network_interface": {
                "id": "nic-1", "name": "eth0", "subnet": {"id": "s-1"},
                "primary_ip": {"address": "10.240.0.4"},
                "security_groups": [{"id": "sg-b"}, {"id": "sg-a"}]
            },
            "network_interfaces": [{
                "id": "nic-1", "name": "eth0", "subnet": {"id": "s-1"},
                "primary_ip": {"address": "10.240.0.4"}
            }],
            "boot_volume_attachment": {"id": "va-1", "name": "boot", "volume": {"id": "vol-boot"}},
            "resource_group": {"id": "rg-default"}
        })
    }

    #[test]
    fn test_expand_interface_requires_subnet() {
        let block = obj(json!({"name": "eth0"}));
        assert!(expand_interface(&block).is_err());

        let block = obj(json!({"subnet": "s-1", "security_groups": ["sg-1"], "primary_ipv4_address": ""}));
        let nic = expand_interface(&block).unwrap();
        assert_eq!(nic.subnet.id, "s-1");
        assert!(nic.primary_ipv4_address.is_none());
        assert_eq!(nic.security_groups.len(), 1);
    }

    #[tokio::test]
    async fn test_create_waits_for_running() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/instances"))
            .and(body_json(json!({
                "name": "web-1",
                "profile": {"name": "bx2-2x8"},
                "vpc": {"id": "r006-vpc"},
                "zone": {"name": "us-south-1"},
                "image": {"id": "img-1"},
                "keys": [{"id": "k-1"}],
                "primary_network_interface": {"subnet": {"id": "s-1"}},
                "resource_group": {"id": "rg-default"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(instance_body("pending", "bx2-2x8")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("starting", "bx2-2x8")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("running", "bx2-2x8")))
            .mount(&server)
            .await;

        let instance = IsInstance::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "name": "web-1",
            "profile": "bx2-2x8",
            "vpc": "r006-vpc",
            "zone": "us-south-1",
            "image": "img-1",
            "keys": ["k-1"],
            "primary_network_interface": [{"subnet": "s-1"}]
        })));
        instance.create(&mut d).await.unwrap();

        assert_eq!(d.get_str("status"), Some("running"));
        let nic = d.get_block("primary_network_interface").unwrap();
        assert_eq!(nic["primary_ipv4_address"], "10.240.0.4");
        assert_eq!(nic["security_groups"], json!(["sg-a", "sg-b"]));
        assert!(d.get_blocks("network_interfaces").is_empty());
        assert_eq!(d.get_blocks("boot_volume")[0]["volume_id"], "vol-boot");
    }

    #[tokio::test]
    async fn test_profile_change_stops_and_starts() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/instances/i-1/actions"))
            .and(body_json(json!({"type": "stop", "force": true})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "a-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(url_path("/v1/instances/i-1/actions"))
            .and(body_json(json!({"type": "start", "force": false})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "a-2"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(url_path("/v1/instances/i-1"))
            .and(body_json(json!({"profile": {"name": "bx2-4x16"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("stopped", "bx2-4x16")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("stopped", "bx2-2x8")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/instances/i-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("running", "bx2-4x16")))
            .mount(&server)
            .await;

        let instance = IsInstance::new(context(&server));
        let prior = obj(json!({"name": "web-1", "profile": "bx2-2x8"}));
        let planned = obj(json!({"profile": "bx2-4x16"}));
        let mut d = ResourceData::for_update("i-1", prior, planned);
        instance.update(&mut d).await.unwrap();
        assert_eq!(d.get_str("profile"), Some("bx2-4x16"));
    }
}
