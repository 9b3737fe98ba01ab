//! `ibm_is_public_gateway` resource

use crate::common::{self, crn_attr, resource_group_attr, status_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{PublicGateway, paths};
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator,
};
use serde_json::{Map, Value, json};

const PENDING: &[&str] = &["pending"];
const AVAILABLE: &[&str] = &["available", "failed"];

fn path(id: &str) -> String {
    format!("{}/{}", paths::PUBLIC_GATEWAYS, id)
}

fn status_of(gateway: &PublicGateway) -> &str {
    &gateway.status
}

/// `floating_ip` map: reuse an existing floating IP by `id` or `address`
fn floating_ip_identity(d: &ResourceData) -> Result<Option<Value>> {
    let Some(fip) = d.get("floating_ip").and_then(Value::as_object) else {
        return Ok(None);
    };
    if let Some(id) = fip.get("id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        return Ok(Some(json!({ "id": id })));
    }
    if let Some(address) = fip.get("address").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        return Ok(Some(json!({ "address": address })));
    }
    if fip.is_empty() {
        return Ok(None);
    }
    Err(ProviderError::InvalidConfig(
        "floating_ip must contain 'id' or 'address'".into(),
    ))
}

/// Public gateway giving a zone's subnets outbound internet access
pub struct IsPublicGateway {
    ctx: Context,
}

impl IsPublicGateway {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsPublicGateway {
    fn type_name(&self) -> &'static str {
        "ibm_is_public_gateway"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr("vpc", Attribute::string().required().force_new())
            .attr("zone", Attribute::string().required().force_new())
            .attr(
                "floating_ip",
                Attribute::map()
                    .optional()
                    .computed()
                    .force_new()
                    .describe("Floating IP to reuse, given by 'id' or 'address'"),
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
        let mut body = Map::new();
        body.insert("name".into(), json!(d.require_str("name")?));
        body.insert("vpc".into(), json!({ "id": d.require_str("vpc")? }));
        body.insert("zone".into(), json!({ "name": d.require_str("zone")? }));
        if let Some(fip) = floating_ip_identity(d)? {
            body.insert("floating_ip".into(), fip);
        }
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let gateway: PublicGateway = self
            .ctx
            .vpc()
            .create(paths::PUBLIC_GATEWAYS, &Value::Object(body))
            .await?;
        tracing::info!("Created public gateway {} ({})", gateway.name, gateway.id);
        d.set_id(gateway.id.as_str());

        let gateway = common::wait_for_state(
            &self.ctx,
            &path(&gateway.id),
            PENDING,
            AVAILABLE,
            d.timeout(Operation::Create),
            status_of,
        )
        .await?;
        common::apply_tags(&self.ctx, d, &gateway.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(gateway) =
            common::read_or_clear::<PublicGateway>(&self.ctx, d, &object_path).await?
        else {
            return Ok(());
        };
        d.set("name", gateway.name.as_str());
        d.set("vpc", gateway.vpc.id.as_str());
        d.set("zone", gateway.zone.name.as_str());
        if let Some(fip) = &gateway.floating_ip {
            d.set("floating_ip", json!({"id": fip.id, "address": fip.address}));
        }
        d.set("resource_group", gateway.resource_group.id.as_str());
        d.set("status", gateway.status.as_str());
        d.set("crn", gateway.crn.as_str());
        common::read_tags(&self.ctx, d, &gateway.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            let _: PublicGateway = self
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
