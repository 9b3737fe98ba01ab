//! Dedicated host groups, dedicated hosts, host profiles and their data sources

use crate::common::{self, crn_attr, resource_group_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{
    DedicatedHost, DedicatedHostGroup, DedicatedHostProfile, ProfileValue, Vcpu, paths,
};
use ibmform_provider::{
    Attribute, DataSource, Operation, ProviderError, Resource, ResourceData, Result, Schema,
    Timeouts, Validator,
};
use serde_json::{Map, Value, json};

const HOST_PENDING: &[&str] = &["pending", "updating"];
const HOST_STABLE: &[&str] = &["stable", "failed"];

fn group_path(id: &str) -> String {
    format!("{}/{}", paths::DEDICATED_HOST_GROUPS, id)
}

fn host_path(id: &str) -> String {
    format!("{}/{}", paths::DEDICATED_HOSTS, id)
}

fn lifecycle_of(host: &DedicatedHost) -> &str {
    &host.lifecycle_state
}

fn vcpu_block(vcpu: Option<&Vcpu>) -> Option<Value> {
    vcpu.map(|v| json!([{"architecture": v.architecture, "count": v.count}]))
}

fn vcpu_schema() -> Schema {
    Schema::new()
        .attr("architecture", Attribute::string().computed())
        .attr("count", Attribute::int().computed())
}

/// Computed attributes shared by the host resource and data sources
fn host_attributes(schema: Schema) -> Schema {
    schema
        .attr("lifecycle_state", Attribute::string().computed())
        .attr("state", Attribute::string().computed())
        .attr("provisionable", Attribute::bool().computed())
        .attr("zone", Attribute::string().computed())
        .attr("memory", Attribute::int().computed())
        .attr("available_memory", Attribute::int().computed())
        .attr("vcpu", Attribute::block(vcpu_schema()).computed())
        .attr("available_vcpu", Attribute::block(vcpu_schema()).computed())
        .attr("socket_count", Attribute::int().computed())
        .attr("instances", Attribute::string_list().computed())
        .attr("supported_instance_profiles", Attribute::string_list().computed())
        .attr("created_at", Attribute::string().computed())
        .attr("crn", crn_attr())
}

fn flatten_host(host: &DedicatedHost) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("id".into(), json!(host.id));
    m.insert("name".into(), json!(host.name));
    m.insert("profile".into(), json!(host.profile.name));
    m.insert("host_group".into(), json!(host.group.id));
    m.insert("instance_placement_enabled".into(), json!(host.instance_placement_enabled));
    m.insert("resource_group".into(), json!(host.resource_group.id));
    m.insert("lifecycle_state".into(), json!(host.lifecycle_state));
    m.insert("state".into(), json!(host.state));
    m.insert("provisionable".into(), json!(host.provisionable));
    m.insert("zone".into(), json!(host.zone.name));
    m.insert("memory".into(), json!(host.memory));
    m.insert("available_memory".into(), json!(host.available_memory));
    m.insert("vcpu".into(), json!(vcpu_block(host.vcpu.as_ref())));
    m.insert("available_vcpu".into(), json!(vcpu_block(host.available_vcpu.as_ref())));
    m.insert("socket_count".into(), json!(host.socket_count));
    m.insert(
        "instances".into(),
        json!(host.instances.iter().map(|i| i.id.clone()).collect::<Vec<_>>()),
    );
    m.insert(
        "supported_instance_profiles".into(),
        json!(host.supported_instance_profiles.iter().map(|p| p.name.clone()).collect::<Vec<_>>()),
    );
    m.insert("created_at".into(), json!(host.created_at.map(|t| t.to_rfc3339())));
    m.insert("crn".into(), json!(host.crn));
    m
}

fn set_host(d: &mut ResourceData, host: &DedicatedHost) {
    for (key, value) in flatten_host(host) {
        if key != "id" {
            d.set(&key, value);
        }
    }
}

/// Group of dedicated hosts sharing a zone, class and family
pub struct IsDedicatedHostGroup {
    ctx: Context,
}

impl IsDedicatedHostGroup {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsDedicatedHostGroup {
    fn type_name(&self) -> &'static str {
        "ibm_is_dedicated_host_group"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string()
                    .optional()
                    .computed()
                    .validate(Validator::ResourceName),
            )
            .attr("class", Attribute::string().required().force_new())
            .attr(
                "family",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(Validator::OneOf(&["balanced", "compute", "memory"])),
            )
            .attr("zone", Attribute::string().required().force_new())
            .attr("resource_group", resource_group_attr())
            .attr("dedicated_hosts", Attribute::string_list().computed())
            .attr("supported_instance_profiles", Attribute::string_list().computed())
            .attr("created_at", Attribute::string().computed())
            .attr("crn", crn_attr())
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let mut body = Map::new();
        body.insert("class".into(), json!(d.require_str("class")?));
        body.insert("family".into(), json!(d.require_str("family")?));
        body.insert("zone".into(), json!({ "name": d.require_str("zone")? }));
        if let Some(name) = d.get_str("name") {
            body.insert("name".into(), json!(name));
        }
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let group: DedicatedHostGroup = self
            .ctx
            .vpc()
            .create(paths::DEDICATED_HOST_GROUPS, &Value::Object(body))
            .await?;
        tracing::info!("Created dedicated host group {} ({})", group.name, group.id);
        d.set_id(group.id.as_str());
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = group_path(d.id());
        let Some(group) =
            common::read_or_clear::<DedicatedHostGroup>(&self.ctx, d, &object_path).await?
        else {
            return Ok(());
        };
        d.set("name", group.name.as_str());
        d.set("class", group.class.as_str());
        d.set("family", group.family.as_str());
        d.set("zone", group.zone.name.as_str());
        d.set("resource_group", group.resource_group.id.as_str());
        d.set(
            "dedicated_hosts",
            group.dedicated_hosts.iter().map(|h| h.id.clone()).collect::<Vec<_>>(),
        );
        d.set(
            "supported_instance_profiles",
            group
                .supported_instance_profiles
                .iter()
                .map(|p| p.name.clone())
                .collect::<Vec<_>>(),
        );
        d.set("created_at", group.created_at.map(|t| t.to_rfc3339()));
        d.set("crn", group.crn.as_str());
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            if let Some(name) = d.get_str("name") {
                let _: DedicatedHostGroup = self
                    .ctx
                    .vpc()
                    .update(&group_path(d.id()), &json!({ "name": name }))
                    .await?;
            }
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        common::delete_vpc_object(&self.ctx, &group_path(d.id())).await?;
        d.clear_id();
        Ok(())
    }
}

/// Single-tenant host inside a dedicated host group
pub struct IsDedicatedHost {
    ctx: Context,
}

impl IsDedicatedHost {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsDedicatedHost {
    fn type_name(&self) -> &'static str {
        "ibm_is_dedicated_host"
    }

    fn schema(&self) -> Schema {
        host_attributes(
            Schema::new()
                .attr(
                    "name",
                    Attribute::string()
                        .optional()
                        .computed()
                        .validate(Validator::ResourceName),
                )
                .attr("profile", Attribute::string().required().force_new())
                .attr("host_group", Attribute::string().required().force_new())
                .attr(
                    "instance_placement_enabled",
                    Attribute::bool()
                        .optional()
                        .default(true)
                        .describe("Whether instances can be placed on this host"),
                )
                .attr("resource_group", resource_group_attr()),
        )
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let mut body = Map::new();
        body.insert("profile".into(), json!({ "name": d.require_str("profile")? }));
        body.insert("group".into(), json!({ "id": d.require_str("host_group")? }));
        body.insert(
            "instance_placement_enabled".into(),
            json!(d.get_bool("instance_placement_enabled").unwrap_or(true)),
        );
        if let Some(name) = d.get_str("name") {
            body.insert("name".into(), json!(name));
        }
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let host: DedicatedHost = self
            .ctx
            .vpc()
            .create(paths::DEDICATED_HOSTS, &Value::Object(body))
            .await?;
        tracing::info!("Created dedicated host {} ({})", host.name, host.id);
        d.set_id(host.id.as_str());

        common::wait_for_state(
            &self.ctx,
            &host_path(&host.id),
            HOST_PENDING,
            HOST_STABLE,
            d.timeout(Operation::Create),
            lifecycle_of,
        )
        .await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = host_path(d.id());
        let Some(host) =
            common::read_or_clear::<DedicatedHost>(&self.ctx, d, &object_path).await?
        else {
            return Ok(());
        };
        set_host(d, &host);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let mut patch = Map::new();
        if d.has_change("name") {
            if let Some(name) = d.get_str("name") {
                patch.insert("name".into(), json!(name));
            }
        }
        if d.has_change("instance_placement_enabled") {
            patch.insert(
                "instance_placement_enabled".into(),
                json!(d.get_bool("instance_placement_enabled").unwrap_or(true)),
            );
        }
        if !patch.is_empty() {
            let _: DedicatedHost = self
                .ctx
                .vpc()
                .update(&host_path(d.id()), &Value::Object(patch))
                .await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let path = host_path(d.id());
        let vpc = self.ctx.vpc();

        // a host only accepts DELETE once placement is disabled
        match vpc
            .update::<DedicatedHost, _>(&path, &json!({"instance_placement_enabled": false}))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                d.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        if common::delete_vpc_object(&self.ctx, &path).await? {
            common::wait_for_deleted(&self.ctx, &path, d.timeout(Operation::Delete), lifecycle_of)
                .await?;
        }
        d.clear_id();
        Ok(())
    }
}

/// Look up one dedicated host by name within a group
pub struct IsDedicatedHostData {
    ctx: Context,
}

impl IsDedicatedHostData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsDedicatedHostData {
    fn type_name(&self) -> &'static str {
        "ibm_is_dedicated_host"
    }

    fn schema(&self) -> Schema {
        host_attributes(
            Schema::new()
                .attr("name", Attribute::string().required())
                .attr("host_group", Attribute::string().required())
                .attr("profile", Attribute::string().computed())
                .attr("instance_placement_enabled", Attribute::bool().computed())
                .attr("resource_group", Attribute::string().computed()),
        )
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let name = d.require_str("name")?.to_string();
        let group = d.require_str("host_group")?.to_string();
        let host = self
            .ctx
            .vpc()
            .list_all::<DedicatedHost>(
                paths::DEDICATED_HOSTS,
                "dedicated_hosts",
                &[("dedicated_host_group.id", group.as_str())],
            )
            .await?
            .into_iter()
            .find(|h| h.name == name)
            .ok_or_else(|| {
                ProviderError::ResourceNotFound(format!(
                    "dedicated host '{}' in group {}",
                    name, group
                ))
            })?;

        d.set_id(host.id.as_str());
        set_host(d, &host);
        Ok(())
    }
}

/// List the dedicated hosts of an account, optionally within one group
pub struct IsDedicatedHostsData {
    ctx: Context,
}

impl IsDedicatedHostsData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsDedicatedHostsData {
    fn type_name(&self) -> &'static str {
        "ibm_is_dedicated_hosts"
    }

    fn schema(&self) -> Schema {
        let host = host_attributes(
            Schema::new()
                .attr("id", Attribute::string().computed())
                .attr("name", Attribute::string().computed())
                .attr("profile", Attribute::string().computed())
                .attr("host_group", Attribute::string().computed())
                .attr("instance_placement_enabled", Attribute::bool().computed())
                .attr("resource_group", Attribute::string().computed()),
        );
        Schema::new()
            .attr("host_group", Attribute::string().optional())
            .attr("dedicated_hosts", Attribute::block(host).computed())
            .attr("total_count", Attribute::int().computed())
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let group = d.get_str("host_group").map(str::to_string);
        let filters: Vec<(&str, &str)> = group
            .as_deref()
            .map(|g| vec![("dedicated_host_group.id", g)])
            .unwrap_or_default();

        let hosts: Vec<DedicatedHost> = self
            .ctx
            .vpc()
            .list_all(paths::DEDICATED_HOSTS, "dedicated_hosts", &filters)
            .await?;

        d.set_id(group.as_deref().unwrap_or("all"));
        d.set("total_count", hosts.len() as i64);
        d.set(
            "dedicated_hosts",
            hosts
                .iter()
                .map(|h| Value::Object(flatten_host(h)))
                .collect::<Vec<_>>(),
        );
        Ok(())
    }
}

fn profile_value_schema() -> Schema {
    Schema::new()
        .attr("type", Attribute::string().computed())
        .attr("value", Attribute::string().computed())
        .attr("default", Attribute::int().computed())
        .attr("min", Attribute::int().computed())
        .attr("max", Attribute::int().computed())
        .attr("step", Attribute::int().computed())
        .attr("values", Attribute::string_list().computed())
}

/// `fixed` values keep their `value`, ranges and enums their bounds
fn profile_value_block(v: &ProfileValue) -> Value {
    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    json!([{
        "type": v.kind,
        "value": v.value.as_ref().map(text),
        "default": v.default,
        "min": v.min,
        "max": v.max,
        "step": v.step,
        "values": v.values.iter().map(text).collect::<Vec<_>>(),
    }])
}

fn flatten_profile(profile: &DedicatedHostProfile) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("name".into(), json!(profile.name));
    m.insert("class".into(), json!(profile.class));
    m.insert("family".into(), json!(profile.family));
    m.insert("memory".into(), profile_value_block(&profile.memory));
    m.insert("socket_count".into(), profile_value_block(&profile.socket_count));
    m.insert("vcpu_architecture".into(), profile_value_block(&profile.vcpu_architecture));
    m.insert("vcpu_count".into(), profile_value_block(&profile.vcpu_count));
    m.insert(
        "supported_instance_profiles".into(),
        json!(profile.supported_instance_profiles.iter().map(|p| p.name.clone()).collect::<Vec<_>>()),
    );
    m
}

/// Dedicated host profiles offered in the region
pub struct IsDedicatedHostProfilesData {
    ctx: Context,
}

impl IsDedicatedHostProfilesData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsDedicatedHostProfilesData {
    fn type_name(&self) -> &'static str {
        "ibm_is_dedicated_host_profiles"
    }

    fn schema(&self) -> Schema {
        let profile = Schema::new()
            .attr("name", Attribute::string().computed())
            .attr("class", Attribute::string().computed())
            .attr("family", Attribute::string().computed())
            .attr("memory", Attribute::block(profile_value_schema()).computed())
            .attr("socket_count", Attribute::block(profile_value_schema()).computed())
            .attr("vcpu_architecture", Attribute::block(profile_value_schema()).computed())
            .attr("vcpu_count", Attribute::block(profile_value_schema()).computed())
            .attr("supported_instance_profiles", Attribute::string_list().computed());
        Schema::new()
            .attr(
                "family",
                Attribute::string()
                    .optional()
                    .validate(Validator::OneOf(&["balanced", "compute", "memory"]))
                    .describe("Only list profiles of this family"),
            )
            .attr("profiles", Attribute::block(profile).computed())
            .attr("total_count", Attribute::int().computed())
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let family = d.get_str("family").map(str::to_string);
        let profiles: Vec<DedicatedHostProfile> = self
            .ctx
            .vpc()
            .list_all(paths::DEDICATED_HOST_PROFILES, "profiles", &[])
            .await?
            .into_iter()
            .filter(|p: &DedicatedHostProfile| family.as_deref().is_none_or(|f| p.family == f))
            .collect();

        d.set_id(family.as_deref().unwrap_or("all"));
        d.set("total_count", profiles.len() as i64);
        d.set(
            "profiles",
            profiles
                .iter()
                .map(|p| Value::Object(flatten_profile(p)))
                .collect::<Vec<_>>(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, obj};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn host_body(lifecycle: &str) -> Value {
        json!({
            "id": "dh-1",
            "crn": "crn:v1:dh-1",
            "name": "host-a",
            "lifecycle_state": lifecycle,
            "state": "available",
            "instance_placement_enabled": true,
            "provisionable": true,
            "profile": {"name": "bx2d-host-152x608"},
            "group": {"id": "dhg-1"},
            "zone": {"name": "us-south-1"},
            "memory": 608,
            "available_memory": 600,
            "vcpu": {"architecture": "amd64", "count": 152},
            "instances": [{"id": "i-1"}],
            "supported_instance_profiles": [{"name": "bx2-2x8"}]
        })
    }

    #[tokio::test]
    async fn test_group_create() {
        let server = MockServer::start().await;
        let body = json!({
            "id": "dhg-1",
            "crn": "crn:v1:dhg-1",
            "name": "group-a",
            "class": "bx2d",
            "family": "balanced",
            "zone": {"name": "us-south-1"},
            "created_at": "2024-05-01T10:00:00Z"
        });
        Mock::given(method("POST"))
            .and(path("/v1/dedicated_host/groups"))
            .and(body_json(json!({
                "name": "group-a",
                "class": "bx2d",
                "family": "balanced",
                "zone": {"name": "us-south-1"},
                "resource_group": {"id": "rg-default"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_host/groups/dhg-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let res = IsDedicatedHostGroup::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "name": "group-a",
            "class": "bx2d",
            "family": "balanced",
            "zone": "us-south-1"
        })));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.id(), "dhg-1");
        assert_eq!(d.get_str("created_at"), Some("2024-05-01T10:00:00+00:00"));
    }

    #[tokio::test]
    async fn test_host_create_waits_for_stable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/dedicated_hosts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(host_body("pending")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_hosts/dh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(host_body("pending")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_hosts/dh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(host_body("stable")))
            .mount(&server)
            .await;

        let res = IsDedicatedHost::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "profile": "bx2d-host-152x608",
            "host_group": "dhg-1"
        })));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.get_str("lifecycle_state"), Some("stable"));
        assert_eq!(d.get_blocks("vcpu")[0]["count"], 152);
        assert_eq!(d.get_string_list("instances"), vec!["i-1"]);
    }

    #[tokio::test]
    async fn test_host_delete_disables_placement_first() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/dedicated_hosts/dh-1"))
            .and(body_json(json!({"instance_placement_enabled": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(host_body("stable")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/dedicated_hosts/dh-1"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_hosts/dh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(host_body("deleting")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_hosts/dh-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let res = IsDedicatedHost::new(context(&server));
        let mut d = ResourceData::from_state("dh-1", obj(json!({})));
        res.delete(&mut d).await.unwrap();
        assert!(d.id().is_empty());
    }

    #[tokio::test]
    async fn test_hosts_data_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_hosts"))
            .and(query_param("dedicated_host_group.id", "dhg-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dedicated_hosts": [host_body("stable")]
            })))
            .mount(&server)
            .await;

        let ds = IsDedicatedHostsData::new(context(&server));
        let mut d = ResourceData::new(obj(json!({"host_group": "dhg-1"})));
        ds.read(&mut d).await.unwrap();
        assert_eq!(d.get_i64("total_count"), Some(1));
        assert_eq!(d.get_blocks("dedicated_hosts")[0]["name"], "host-a");

        let single = IsDedicatedHostData::new(context(&server));
        let mut d = ResourceData::new(obj(json!({"name": "host-a", "host_group": "dhg-1"})));
        single.read(&mut d).await.unwrap();
        assert_eq!(d.id(), "dh-1");
        assert_eq!(d.get_str("profile"), Some("bx2d-host-152x608"));
    }

    #[tokio::test]
    async fn test_profiles_filtered_by_family() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_host/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "profiles": [
                    {
                        "name": "bx2d-host-152x608",
                        "class": "bx2d",
                        "family": "balanced",
                        "memory": {"type": "fixed", "value": 608},
                        "socket_count": {"type": "fixed", "value": 4},
                        "vcpu_architecture": {"type": "fixed", "value": "amd64"},
                        "vcpu_count": {"type": "fixed", "value": 152},
                        "supported_instance_profiles": [{"name": "bx2-2x8"}, {"name": "bx2-4x16"}]
                    },
                    {
                        "name": "cx2-host-152x304",
                        "class": "cx2",
                        "family": "compute",
                        "memory": {"type": "fixed", "value": 304}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let ds = IsDedicatedHostProfilesData::new(context(&server));
        let mut d = ResourceData::new(obj(json!({"family": "balanced"})));
        ds.read(&mut d).await.unwrap();
        assert_eq!(d.id(), "balanced");
        assert_eq!(d.get_i64("total_count"), Some(1));
        let profile = d.get_blocks("profiles")[0].clone();
        assert_eq!(profile["name"], "bx2d-host-152x608");
        assert_eq!(profile["memory"][0]["value"], "608");
        assert_eq!(profile["vcpu_architecture"][0]["value"], "amd64");
        assert_eq!(profile["supported_instance_profiles"], json!(["bx2-2x8", "bx2-4x16"]));
    }
}
