//! `ibm_is_subnet` resource

use crate::common::{self, crn_attr, resource_group_attr, status_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{IdRef, NameRef, Subnet, SubnetPrototype, paths};
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator,
};
use serde_json::{Map, Value, json};

const PENDING: &[&str] = &["pending", "updating"];
const AVAILABLE: &[&str] = &["available", "failed"];

fn path(id: &str) -> String {
    format!("{}/{}", paths::SUBNETS, id)
}

fn status_of(subnet: &Subnet) -> &str {
    &subnet.status
}

/// Subnet inside a VPC zone, sized by CIDR block or address count
pub struct IsSubnet {
    ctx: Context,
}

impl IsSubnet {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    async fn wait_available(&self, id: &str, timeout: std::time::Duration) -> Result<Subnet> {
        common::wait_for_state(&self.ctx, &path(id), PENDING, AVAILABLE, timeout, status_of).await
    }
}

#[async_trait]
impl Resource for IsSubnet {
    fn type_name(&self) -> &'static str {
        "ibm_is_subnet"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr("vpc", Attribute::string().required().force_new().describe("VPC id"))
            .attr("zone", Attribute::string().required().force_new())
            .attr(
                "ipv4_cidr_block",
                Attribute::string()
                    .optional()
                    .computed()
                    .force_new()
                    .conflicts_with(&["total_ipv4_address_count"])
                    .validate(Validator::Cidr),
            )
            .attr(
                "total_ipv4_address_count",
                Attribute::int()
                    .optional()
                    .computed()
                    .force_new()
                    .conflicts_with(&["ipv4_cidr_block"]),
            )
            .attr(
                "ip_version",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("ipv4")
                    .validate(Validator::OneOf(&["ipv4"])),
            )
            .attr("network_acl", Attribute::string().optional().computed())
            .attr(
                "public_gateway",
                Attribute::string()
                    .optional()
                    .describe("Public gateway attached to the subnet"),
            )
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("available_ipv4_address_count", Attribute::int().computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let ipv4_cidr_block = d.get_str("ipv4_cidr_block").map(str::to_string);
        let total_ipv4_address_count = d.get_i64("total_ipv4_address_count");
        if ipv4_cidr_block.is_none() && total_ipv4_address_count.is_none() {
            return Err(ProviderError::InvalidConfig(
                "one of ipv4_cidr_block or total_ipv4_address_count must be set".into(),
            ));
        }

        let body = SubnetPrototype {
            name: d.require_str("name")?.to_string(),
            vpc: IdRef::new(d.require_str("vpc")?),
            zone: NameRef::new(d.require_str("zone")?),
            ip_version: d.get_str("ip_version").unwrap_or("ipv4").to_string(),
            ipv4_cidr_block,
            total_ipv4_address_count,
            network_acl: d.get_str("network_acl").map(IdRef::new),
            public_gateway: d.get_str("public_gateway").map(IdRef::new),
            resource_group: common::resource_group(&self.ctx, d),
        };
        let subnet: Subnet = self.ctx.vpc().create(paths::SUBNETS, &body).await?;
        tracing::info!("Created subnet {} ({})", subnet.name, subnet.id);
        d.set_id(subnet.id.as_str());

        let subnet = self
            .wait_available(&subnet.id, d.timeout(Operation::Create))
            .await?;
        common::apply_tags(&self.ctx, d, &subnet.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(subnet) = common::read_or_clear::<Subnet>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        d.set("name", subnet.name.as_str());
        d.set("vpc", subnet.vpc.id.as_str());
        d.set("zone", subnet.zone.name.as_str());
        d.set("ipv4_cidr_block", subnet.ipv4_cidr_block.clone());
        d.set("total_ipv4_address_count", subnet.total_ipv4_address_count);
        d.set("available_ipv4_address_count", subnet.available_ipv4_address_count);
        d.set("ip_version", subnet.ip_version.as_str());
        d.set("network_acl", subnet.network_acl.as_ref().map(|r| r.id.clone()));
        d.set("public_gateway", subnet.public_gateway.as_ref().map(|r| r.id.clone()));
        d.set("resource_group", subnet.resource_group.id.as_str());
        d.set("status", subnet.status.as_str());
        d.set("crn", subnet.crn.as_str());
        common::read_tags(&self.ctx, d, &subnet.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        let vpc = self.ctx.vpc();

        let mut patch = Map::new();
        if d.has_change("name") {
            patch.insert("name".into(), json!(d.require_str("name")?));
        }
        if d.has_change("network_acl") {
            if let Some(acl) = d.get_str("network_acl") {
                patch.insert("network_acl".into(), json!({ "id": acl }));
            }
        }
        if !patch.is_empty() {
            let _: Subnet = vpc.update(&path(&id), &Value::Object(patch)).await?;
        }

        if d.has_change("public_gateway") {
            match d.get_str("public_gateway") {
                Some(gateway) => {
                    tracing::info!("Attaching public gateway {} to subnet {}", gateway, id);
                    vpc.set_subnet_public_gateway(&id, gateway).await?;
                }
                None => {
                    tracing::info!("Detaching public gateway from subnet {}", id);
                    vpc.unset_subnet_public_gateway(&id).await?;
                }
            }
            self.wait_available(&id, d.timeout(Operation::Update)).await?;
        }

        if d.has_change("tags") {
            let crn = d.require_str("crn")?.to_string();
            common::apply_tags(&self.ctx, d, &crn).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();
        if d.get_str("public_gateway").is_some() {
            match self.ctx.vpc().unset_subnet_public_gateway(&id).await {
                Err(e) if !e.is_not_found() => return Err(e.into()),
                _ => {}
            }
            self.wait_available(&id, d.timeout(Operation::Delete)).await?;
        }

        let path = path(&id);
        if common::delete_vpc_object(&self.ctx, &path).await? {
            common::wait_for_deleted(&self.ctx, &path, d.timeout(Operation::Delete), status_of)
                .await?;
        }
        d.clear_id();
        Ok(())
    }
}
