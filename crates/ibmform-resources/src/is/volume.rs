//! `ibm_is_volume` resource and the volume data sources

use crate::common::{self, crn_attr, resource_group_attr, status_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{CrnRef, NameRef, Volume, VolumePrototype, paths};
use ibmform_provider::{
    Attribute, DataSource, Operation, ProviderError, Resource, ResourceData, Result, Schema,
    Timeouts, Validator,
};
use serde_json::{Map, Value, json};

const PENDING: &[&str] = &["pending", "updating"];
const AVAILABLE: &[&str] = &["available", "failed"];

const PROFILES: &[&str] = &["general-purpose", "5iops-tier", "10iops-tier", "custom"];

fn path(id: &str) -> String {
    format!("{}/{}", paths::VOLUMES, id)
}

fn status_of(volume: &Volume) -> &str {
    &volume.status
}

fn set_volume(d: &mut ResourceData, volume: &Volume) {
    d.set("name", volume.name.as_str());
    d.set("profile", volume.profile.name.as_str());
    d.set("zone", volume.zone.name.as_str());
    d.set("capacity", volume.capacity);
    d.set("iops", volume.iops);
    d.set(
        "encryption_key",
        volume.encryption_key.as_ref().map(|k| k.crn.clone()),
    );
    d.set("resource_group", volume.resource_group.id.as_str());
    d.set("status", volume.status.as_str());
    d.set("crn", volume.crn.as_str());
}

fn flatten_volume(volume: &Volume) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("id".into(), json!(volume.id));
    m.insert("name".into(), json!(volume.name));
    m.insert("profile".into(), json!(volume.profile.name));
    m.insert("zone".into(), json!(volume.zone.name));
    m.insert("capacity".into(), json!(volume.capacity));
    m.insert("iops".into(), json!(volume.iops));
    m.insert(
        "encryption_key".into(),
        json!(volume.encryption_key.as_ref().map(|k| k.crn.clone())),
    );
    m.insert("resource_group".into(), json!(volume.resource_group.id));
    m.insert("tags".into(), json!(volume.user_tags));
    m.insert("status".into(), json!(volume.status));
    m.insert("crn".into(), json!(volume.crn));
    m
}

/// Block storage volume
pub struct IsVolume {
    ctx: Context,
}

impl IsVolume {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsVolume {
    fn type_name(&self) -> &'static str {
        "ibm_is_volume"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr(
                "profile",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(Validator::OneOf(PROFILES)),
            )
            .attr("zone", Attribute::string().required().force_new())
            .attr(
                "capacity",
                Attribute::int()
                    .optional()
                    .default(100)
                    .validate(Validator::IntBetween(10, 16000))
                    .describe("Capacity in GB; can only grow"),
            )
            .attr(
                "iops",
                Attribute::int()
                    .optional()
                    .computed()
                    .force_new()
                    .describe("Maximum IOPS, required for the custom profile"),
            )
            .attr(
                "encryption_key",
                Attribute::string()
                    .optional()
                    .force_new()
                    .describe("CRN of a Key Protect or HPCS root key"),
            )
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let profile = d.require_str("profile")?.to_string();
        let iops = d.get_i64("iops");
        if profile == "custom" && iops.is_none() {
            return Err(ProviderError::InvalidConfig(
                "iops is required for the custom volume profile".into(),
            ));
        }

        let body = VolumePrototype {
            name: d.require_str("name")?.to_string(),
            profile: NameRef::new(profile),
            zone: NameRef::new(d.require_str("zone")?),
            capacity: d.get_i64("capacity").unwrap_or(100),
            iops,
            encryption_key: d.get_str("encryption_key").map(|crn| CrnRef {
                crn: crn.to_string(),
            }),
            resource_group: common::resource_group(&self.ctx, d),
        };
        let volume: Volume = self.ctx.vpc().create(paths::VOLUMES, &body).await?;
        tracing::info!("Created volume {} ({})", volume.name, volume.id);
        d.set_id(volume.id.as_str());

        let volume = common::wait_for_state(
            &self.ctx,
            &path(&volume.id),
            PENDING,
            AVAILABLE,
            d.timeout(Operation::Create),
            status_of,
        )
        .await?;
        common::apply_tags(&self.ctx, d, &volume.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(volume) = common::read_or_clear::<Volume>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        set_volume(d, &volume);
        common::read_tags(&self.ctx, d, &volume.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let mut patch = Map::new();
        if d.has_change("name") {
            patch.insert("name".into(), json!(d.require_str("name")?));
        }
        if d.has_change("capacity") {
            let (old, new) = d.get_change("capacity");
            let old = old.and_then(Value::as_i64).unwrap_or(0);
            let new = new.and_then(Value::as_i64).unwrap_or(old);
            if new < old {
                return Err(ProviderError::InvalidConfig(format!(
                    "volume capacity can only be increased ({} -> {})",
                    old, new
                )));
            }
            patch.insert("capacity".into(), json!(new));
        }
        if !patch.is_empty() {
            let path = path(d.id());
            let _: Volume = self.ctx.vpc().update(&path, &Value::Object(patch)).await?;
            common::wait_for_state(
                &self.ctx,
                &path,
                PENDING,
                AVAILABLE,
                d.timeout(Operation::Update),
                status_of,
            )
            .await?;
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

/// Look up a volume by name
pub struct IsVolumeData {
    ctx: Context,
}

impl IsVolumeData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsVolumeData {
    fn type_name(&self) -> &'static str {
        "ibm_is_volume"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::string().required())
            .attr(
                "zone",
                Attribute::string()
                    .optional()
                    .computed()
                    .describe("Restrict the lookup to one zone"),
            )
            .attr("profile", Attribute::string().computed())
            .attr("capacity", Attribute::int().computed())
            .attr("iops", Attribute::int().computed())
            .attr("encryption_key", Attribute::string().computed())
            .attr("resource_group", Attribute::string().computed())
            .attr("tags", Attribute::string_set().computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let name = d.require_str("name")?.to_string();
        let mut filters = vec![("name", name.as_str())];
        let zone = d.get_str("zone").map(str::to_string);
        if let Some(zone) = &zone {
            filters.push(("zone.name", zone.as_str()));
        }

        let volume = self
            .ctx
            .vpc()
            .list_all::<Volume>(paths::VOLUMES, "volumes", &filters)
            .await?
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ProviderError::ResourceNotFound(format!("volume '{}'", name)))?;

        d.set_id(volume.id.as_str());
        set_volume(d, &volume);
        common::read_tags(&self.ctx, d, &volume.crn).await;
        Ok(())
    }
}

/// Every volume in the region, optionally narrowed to a zone or resource group
pub struct IsVolumesData {
    ctx: Context,
}

impl IsVolumesData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsVolumesData {
    fn type_name(&self) -> &'static str {
        "ibm_is_volumes"
    }

    fn schema(&self) -> Schema {
        let volume = Schema::new()
            .attr("id", Attribute::string().computed())
            .attr("name", Attribute::string().computed())
            .attr("profile", Attribute::string().computed())
            .attr("zone", Attribute::string().computed())
            .attr("capacity", Attribute::int().computed())
            .attr("iops", Attribute::int().computed())
            .attr("encryption_key", Attribute::string().computed())
            .attr("resource_group", Attribute::string().computed())
            .attr("tags", Attribute::string_set().computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr());
        Schema::new()
            .attr("zone", Attribute::string().optional())
            .attr("resource_group", Attribute::string().optional())
            .attr("volumes", Attribute::block(volume).computed())
            .attr("total_count", Attribute::int().computed())
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let zone = d.get_str("zone").map(str::to_string);
        let group = d.get_str("resource_group").map(str::to_string);
        let mut filters = Vec::new();
        if let Some(zone) = &zone {
            filters.push(("zone.name", zone.as_str()));
        }
        if let Some(group) = &group {
            filters.push(("resource_group.id", group.as_str()));
        }

        let volumes: Vec<Volume> = self
            .ctx
            .vpc()
            .list_all(paths::VOLUMES, "volumes", &filters)
            .await?;

        d.set_id(format!(
            "{}/{}",
            zone.as_deref().unwrap_or("all"),
            group.as_deref().unwrap_or("all")
        ));
        d.set("total_count", volumes.len() as i64);
        d.set(
            "volumes",
            volumes
                .iter()
                .map(|v| Value::Object(flatten_volume(v)))
                .collect::<Vec<_>>(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, mount_tags, obj, offline_context};
    use wiremock::matchers::{body_json, method, path as url_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn volume_body(capacity: i64, status: &str) -> Value {
        json!({
            "id": "vol-1",
            "crn": "crn:v1:vol-1",
            "name": "data",
            "status": status,
            "capacity": capacity,
            "iops": 3000,
            "profile": {"name": "general-purpose"},
            "zone": {"name": "us-south-1"},
            "resource_group": {"id": "rg-default"}
        })
    }

    #[tokio::test]
    async fn test_capacity_cannot_shrink() {
        let volume = IsVolume::new(offline_context());
        let prior = obj(json!({"name": "data", "capacity": 200}));
        let planned = obj(json!({"capacity": 100}));
        let mut d = ResourceData::for_update("vol-1", prior, planned);
        let err = volume.update(&mut d).await.unwrap_err();
        assert!(err.to_string().contains("only be increased"));
    }

    #[tokio::test]
    async fn test_custom_profile_needs_iops() {
        let volume = IsVolume::new(offline_context());
        let mut d = ResourceData::new(obj(json!({"name": "data", "profile": "custom", "zone": "us-south-1"})));
        assert!(volume.create(&mut d).await.is_err());
    }

    #[tokio::test]
    async fn test_capacity_increase_waits() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("PATCH"))
            .and(url_path("/v1/volumes/vol-1"))
            .and(body_json(json!({"capacity": 250})))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume_body(100, "updating")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/volumes/vol-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume_body(250, "updating")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/volumes/vol-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume_body(250, "available")))
            .mount(&server)
            .await;

        let volume = IsVolume::new(context(&server));
        let prior = obj(json!({"name": "data", "capacity": 100}));
        let planned = obj(json!({"capacity": 250}));
        let mut d = ResourceData::for_update("vol-1", prior, planned);
        volume.update(&mut d).await.unwrap();
        assert_eq!(d.get_i64("capacity"), Some(250));
        assert_eq!(d.get_str("status"), Some("available"));
    }

    #[tokio::test]
    async fn test_data_source_filters_by_name() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(url_path("/v1/volumes"))
            .and(query_param("name", "data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "volumes": [volume_body(100, "available")]
            })))
            .mount(&server)
            .await;

        let ds = IsVolumeData::new(context(&server));
        let mut d = ResourceData::new(obj(json!({"name": "data"})));
        ds.read(&mut d).await.unwrap();
        assert_eq!(d.id(), "vol-1");
        assert_eq!(d.get_i64("iops"), Some(3000));
        assert_eq!(d.get_str("profile"), Some("general-purpose"));
    }

    #[tokio::test]
    async fn test_volumes_data_source_follows_pages() {
        let server = MockServer::start().await;
        let mut second = volume_body(10, "available");
        second["id"] = json!("vol-2");
        second["name"] = json!("logs");
        second["user_tags"] = json!(["env:dev"]);
        Mock::given(method("GET"))
            .and(url_path("/v1/volumes"))
            .and(query_param("zone.name", "us-south-1"))
            .and(query_param("start", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"volumes": [second]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/volumes"))
            .and(query_param("zone.name", "us-south-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "volumes": [volume_body(100, "available")],
                "next": {"href": format!("{}/v1/volumes?limit=50&start=page-2", server.uri())}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let ds = IsVolumesData::new(context(&server));
        let mut d = ResourceData::new(obj(json!({"zone": "us-south-1"})));
        ds.read(&mut d).await.unwrap();
        assert_eq!(d.id(), "us-south-1/all");
        assert_eq!(d.get_i64("total_count"), Some(2));
        let volumes = d.get_blocks("volumes");
        assert_eq!(volumes[0]["name"], "data");
        assert_eq!(volumes[1]["tags"], json!(["env:dev"]));
    }
}
