//! `ibm_is_vpc` resource and data source

use crate::common::{self, crn_attr, resource_group_attr, status_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{Subnet, Vpc, VpcPrototype, paths};
use ibmform_provider::{
    Attribute, DataSource, Operation, ProviderError, Resource, ResourceData, Result, Schema,
    Timeouts, Validator,
};
use serde_json::{Value, json};

const PENDING: &[&str] = &["pending"];
const AVAILABLE: &[&str] = &["available", "failed"];

fn path(id: &str) -> String {
    format!("{}/{}", paths::VPCS, id)
}

fn status_of(vpc: &Vpc) -> &str {
    &vpc.status
}

fn cse_source_addresses() -> Attribute {
    Attribute::block(
        Schema::new()
            .attr("address", Attribute::string().computed())
            .attr("zone_name", Attribute::string().computed()),
    )
    .computed()
    .describe("Cloud service endpoint source addresses per zone")
}

fn set_vpc(d: &mut ResourceData, vpc: &Vpc) {
    d.set("name", vpc.name.as_str());
    d.set("classic_access", vpc.classic_access);
    d.set("status", vpc.status.as_str());
    d.set("crn", vpc.crn.as_str());
    d.set("resource_group", vpc.resource_group.id.as_str());
    d.set(
        "default_network_acl",
        vpc.default_network_acl.as_ref().map(|r| r.id.clone()),
    );
    d.set(
        "default_security_group",
        vpc.default_security_group.as_ref().map(|r| r.id.clone()),
    );
    d.set(
        "default_routing_table",
        vpc.default_routing_table.as_ref().map(|r| r.id.clone()),
    );
    let cse: Vec<Value> = vpc
        .cse_source_ips
        .iter()
        .map(|ip| json!({"address": ip.ip.address, "zone_name": ip.zone.name}))
        .collect();
    d.set("cse_source_addresses", cse);
}

/// Virtual private cloud
pub struct IsVpc {
    ctx: Context,
}

impl IsVpc {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsVpc {
    fn type_name(&self) -> &'static str {
        "ibm_is_vpc"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string()
                    .required()
                    .validate(Validator::ResourceName)
                    .describe("VPC name"),
            )
            .attr(
                "classic_access",
                Attribute::bool().optional().force_new().default(false),
            )
            .attr(
                "address_prefix_management",
                Attribute::string()
                    .optional()
                    .default("auto")
                    .apply_once()
                    .validate(Validator::OneOf(&["auto", "manual"]))
                    .describe("Whether default address prefixes are created per zone"),
            )
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
            .attr("default_network_acl", Attribute::string().computed())
            .attr("default_security_group", Attribute::string().computed())
            .attr("default_routing_table", Attribute::string().computed())
            .attr("cse_source_addresses", cse_source_addresses())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let body = VpcPrototype {
            name: d.require_str("name")?.to_string(),
            address_prefix_management: d
                .get_str("address_prefix_management")
                .unwrap_or("auto")
                .to_string(),
            classic_access: d.get_bool("classic_access").unwrap_or(false),
            resource_group: common::resource_group(&self.ctx, d),
        };
        let vpc: Vpc = self.ctx.vpc().create(paths::VPCS, &body).await?;
        tracing::info!("Created VPC {} ({})", vpc.name, vpc.id);
        d.set_id(vpc.id.as_str());

        let vpc = common::wait_for_state(
            &self.ctx,
            &path(&vpc.id),
            PENDING,
            AVAILABLE,
            d.timeout(Operation::Create),
            status_of,
        )
        .await?;
        common::apply_tags(&self.ctx, d, &vpc.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(vpc) = common::read_or_clear::<Vpc>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        set_vpc(d, &vpc);
        common::read_tags(&self.ctx, d, &vpc.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            let _: Vpc = self
                .ctx
                .vpc()
                .update(&path(d.id()), &json!({"name": d.require_str("name")?}))
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

/// Look up a VPC by name
pub struct IsVpcData {
    ctx: Context,
}

impl IsVpcData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsVpcData {
    fn type_name(&self) -> &'static str {
        "ibm_is_vpc"
    }

    fn schema(&self) -> Schema {
        let subnet = Schema::new()
            .attr("id", Attribute::string().computed())
            .attr("name", Attribute::string().computed())
            .attr("status", Attribute::string().computed())
            .attr("zone", Attribute::string().computed())
            .attr("total_ipv4_address_count", Attribute::int().computed())
            .attr("available_ipv4_address_count", Attribute::int().computed());

        Schema::new()
            .attr("name", Attribute::string().required().describe("VPC name"))
            .attr("classic_access", Attribute::bool().computed())
            .attr("resource_group", Attribute::string().computed())
            .attr("tags", Attribute::string_set().computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
            .attr("default_network_acl", Attribute::string().computed())
            .attr("default_security_group", Attribute::string().computed())
            .attr("default_routing_table", Attribute::string().computed())
            .attr("cse_source_addresses", cse_source_addresses())
            .attr("subnets", Attribute::block(subnet).computed())
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let name = d.require_str("name")?.to_string();
        let vpc = self
            .ctx
            .vpc()
            .list_all::<Vpc>(paths::VPCS, "vpcs", &[])
            .await?
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ProviderError::ResourceNotFound(format!("VPC '{}'", name)))?;

        d.set_id(vpc.id.as_str());
        set_vpc(d, &vpc);

        let subnets: Vec<Subnet> = self
            .ctx
            .vpc()
            .list_all(paths::SUBNETS, "subnets", &[("vpc.id", vpc.id.as_str())])
            .await?;
        let subnets: Vec<Value> = subnets
            .iter()
            .map(|s| {
                json!({
                    "id": s.id,
                    "name": s.name,
                    "status": s.status,
                    "zone": s.zone.name,
                    "total_ipv4_address_count": s.total_ipv4_address_count,
                    "available_ipv4_address_count": s.available_ipv4_address_count,
                })
            })
            .collect();
        d.set("subnets", subnets);

        common::read_tags(&self.ctx, d, &vpc.crn).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, mount_tags, obj, offline_context};
    use wiremock::matchers::{body_json, method, path as url_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vpc_body(status: &str) -> Value {
        json!({
            "id": "r006-vpc",
            "crn": "crn:v1:bluemix:public:is:us-south:a/acc::vpc:r006-vpc",
            "name": "demo-vpc",
            "status": status,
            "classic_access": false,
            "resource_group": {"id": "rg-default"},
            "default_security_group": {"id": "r006-sg"},
            "cse_source_ips": [{"ip": {"address": "10.16.0.4"}, "zone": {"name": "us-south-1"}}]
        })
    }

    #[test]
    fn test_schema_rejects_bad_name() {
        let schema = IsVpc::new(offline_context()).schema();
        let diags = schema.validate(&obj(json!({"name": "Bad_Name"})));
        assert!(diags.iter().any(|d| d.path == "name"));
        let diags = schema.validate(&obj(json!({"name": "ok-name", "address_prefix_management": "sometimes"})));
        assert!(diags.iter().any(|d| d.path == "address_prefix_management"));
    }

    #[tokio::test]
    async fn test_create_waits_until_available() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/vpcs"))
            .and(body_json(json!({
                "name": "demo-vpc",
                "address_prefix_management": "auto",
                "classic_access": false,
                "resource_group": {"id": "rg-default"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(vpc_body("pending")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpcs/r006-vpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vpc_body("pending")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpcs/r006-vpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vpc_body("available")))
            .mount(&server)
            .await;

        let vpc = IsVpc::new(context(&server));
        let mut config = obj(json!({"name": "demo-vpc"}));
        vpc.schema().apply_defaults(&mut config);
        let mut d = ResourceData::new(config).with_timeouts(vpc.timeouts());
        vpc.create(&mut d).await.unwrap();

        assert_eq!(d.id(), "r006-vpc");
        assert_eq!(d.get_str("status"), Some("available"));
        assert_eq!(d.get_str("default_security_group"), Some("r006-sg"));
        assert_eq!(d.get_blocks("cse_source_addresses")[0]["zone_name"], "us-south-1");
    }

    #[tokio::test]
    async fn test_read_missing_clears_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpcs/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errors": [{"code": "not_found", "message": "VPC not found"}]
            })))
            .mount(&server)
            .await;

        let vpc = IsVpc::new(context(&server));
        let mut d = ResourceData::from_state("gone", obj(json!({"name": "x"})));
        vpc.read(&mut d).await.unwrap();
        assert!(d.id().is_empty());
    }

    #[tokio::test]
    async fn test_update_renames() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("PATCH"))
            .and(url_path("/v1/vpcs/r006-vpc"))
            .and(body_json(json!({"name": "demo-vpc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(vpc_body("available")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpcs/r006-vpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vpc_body("available")))
            .mount(&server)
            .await;

        let vpc = IsVpc::new(context(&server));
        let prior = obj(json!({"name": "old-vpc", "crn": "crn:v1:x"}));
        let planned = obj(json!({"name": "demo-vpc"}));
        let mut d = ResourceData::for_update("r006-vpc", prior, planned);
        vpc.update(&mut d).await.unwrap();
        assert_eq!(d.get_str("name"), Some("demo-vpc"));
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(url_path("/v1/vpcs/r006-vpc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpcs/r006-vpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vpc_body("deleting")))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpcs/r006-vpc"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let vpc = IsVpc::new(context(&server));
        let mut d = ResourceData::from_state("r006-vpc", obj(json!({"name": "demo-vpc"})));
        vpc.delete(&mut d).await.unwrap();
        assert!(d.id().is_empty());
    }

    #[tokio::test]
    async fn test_data_source_by_name() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpcs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vpcs": [vpc_body("available")]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/subnets"))
            .and(query_param("vpc.id", "r006-vpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subnets": [{
                "id": "s-1", "crn": "crn:s-1", "name": "a", "status": "available",
                "ipv4_cidr_block": "10.240.0.0/24", "total_ipv4_address_count": 256,
                "available_ipv4_address_count": 251,
                "vpc": {"id": "r006-vpc"}, "zone": {"name": "us-south-1"}
            }]})))
            .mount(&server)
            .await;

        let ds = IsVpcData::new(context(&server));
        let mut d = ResourceData::new(obj(json!({"name": "demo-vpc"})));
        ds.read(&mut d).await.unwrap();
        assert_eq!(d.id(), "r006-vpc");
        let subnets = d.get_blocks("subnets");
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets[0]["available_ipv4_address_count"], 251);

        let mut missing = ResourceData::new(obj(json!({"name": "other"})));
        assert!(ds.read(&mut missing).await.unwrap_err().is_not_found());
    }
}
