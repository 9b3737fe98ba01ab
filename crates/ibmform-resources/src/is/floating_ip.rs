//! `ibm_is_floating_ip` resource

use crate::common::{self, crn_attr, resource_group_attr, status_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{FloatingIp, paths};
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator,
};
use serde_json::{Map, Value, json};

const PENDING: &[&str] = &["pending"];
const AVAILABLE: &[&str] = &["available", "failed"];

fn path(id: &str) -> String {
    format!("{}/{}", paths::FLOATING_IPS, id)
}

fn status_of(fip: &FloatingIp) -> &str {
    &fip.status
}

/// Floating IP reserved in a zone or bound to a network interface
pub struct IsFloatingIp {
    ctx: Context,
}

impl IsFloatingIp {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsFloatingIp {
    fn type_name(&self) -> &'static str {
        "ibm_is_floating_ip"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr(
                "target",
                Attribute::string()
                    .optional()
                    .computed()
                    .conflicts_with(&["zone"])
                    .describe("Network interface the address is bound to"),
            )
            .attr(
                "zone",
                Attribute::string()
                    .optional()
                    .computed()
                    .force_new()
                    .conflicts_with(&["target"]),
            )
            .attr("address", Attribute::string().computed())
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
        match (d.get_str("target"), d.get_str("zone")) {
            (Some(target), _) => {
                body.insert("target".into(), json!({ "id": target }));
            }
            (None, Some(zone)) => {
                body.insert("zone".into(), json!({ "name": zone }));
            }
            (None, None) => {
                return Err(ProviderError::InvalidConfig(
                    "one of target or zone must be set".into(),
                ));
            }
        }
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let fip: FloatingIp = self
            .ctx
            .vpc()
            .create(paths::FLOATING_IPS, &Value::Object(body))
            .await?;
        tracing::info!("Reserved floating IP {} ({})", fip.address, fip.id);
        d.set_id(fip.id.as_str());

        let fip = common::wait_for_state(
            &self.ctx,
            &path(&fip.id),
            PENDING,
            AVAILABLE,
            d.timeout(Operation::Create),
            status_of,
        )
        .await?;
        common::apply_tags(&self.ctx, d, &fip.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(fip) = common::read_or_clear::<FloatingIp>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        d.set("name", fip.name.as_str());
        d.set("address", fip.address.as_str());
        d.set("zone", fip.zone.name.as_str());
        d.set("target", fip.target.as_ref().map(|t| t.id.clone()));
        d.set("resource_group", fip.resource_group.id.as_str());
        d.set("status", fip.status.as_str());
        d.set("crn", fip.crn.as_str());
        common::read_tags(&self.ctx, d, &fip.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let mut patch = Map::new();
        if d.has_change("name") {
            patch.insert("name".into(), json!(d.require_str("name")?));
        }
        if d.has_change("target") {
            let Some(target) = d.get_str("target") else {
                return Err(ProviderError::InvalidConfig(
                    "target cannot be removed from a bound floating IP; recreate it instead".into(),
                ));
            };
            patch.insert("target".into(), json!({ "id": target }));
        }
        if !patch.is_empty() {
            let _: FloatingIp = self
                .ctx
                .vpc()
                .update(&path(d.id()), &Value::Object(patch))
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
