//! `ibm_is_lb` resource

use crate::common::{self, crn_attr, resource_group_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{LoadBalancer, paths};
use ibmform_provider::flex::flatten_string_set;
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator,
};
use serde_json::{Map, Value, json};
use std::time::Duration;

const PENDING: &[&str] = &[
    "create_pending",
    "update_pending",
    "maintenance_pending",
    "delete_pending",
];
const ACTIVE: &[&str] = &["active", "failed"];

pub(crate) fn lb_path(id: &str) -> String {
    format!("{}/{}", paths::LOAD_BALANCERS, id)
}

fn provisioning_of(lb: &LoadBalancer) -> &str {
    &lb.provisioning_status
}

/// Wait until a load balancer accepts changes again
///
/// Listeners, pools and members can only be changed while their load
/// balancer is `active`.
pub(crate) async fn wait_lb_active(ctx: &Context, lb_id: &str, timeout: Duration) -> Result<LoadBalancer> {
    common::wait_for_state(ctx, &lb_path(lb_id), PENDING, ACTIVE, timeout, provisioning_of).await
}

/// Pool id from either a bare id or an `lbID/poolID` composite
pub(crate) fn pool_id(raw: &str) -> &str {
    raw.rsplit('/').next().unwrap_or(raw)
}

/// Application or network load balancer
pub struct IsLb {
    ctx: Context,
}

impl IsLb {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsLb {
    fn type_name(&self) -> &'static str {
        "ibm_is_lb"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr("subnets", Attribute::string_set().required().force_new())
            .attr(
                "type",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("public")
                    .validate(Validator::OneOf(&["public", "private"])),
            )
            .attr(
                "security_groups",
                Attribute::string_set().optional().computed().force_new(),
            )
            .attr(
                "profile",
                Attribute::string()
                    .optional()
                    .force_new()
                    .validate(Validator::OneOf(&["network-fixed"]))
                    .describe("Set to network-fixed for a network load balancer"),
            )
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("hostname", Attribute::string().computed())
            .attr("public_ips", Attribute::string_list().computed())
            .attr("private_ips", Attribute::string_list().computed())
            .attr("operating_status", Attribute::string().computed())
            .attr("status", Attribute::string().computed())
            .attr("crn", crn_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(30, 30, 30)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let subnets: Vec<Value> = d
            .get_string_list("subnets")
            .into_iter()
            .map(|id| json!({ "id": id }))
            .collect();
        if subnets.is_empty() {
            return Err(ProviderError::InvalidConfig("subnets must not be empty".into()));
        }

        let mut body = Map::new();
        body.insert("name".into(), json!(d.require_str("name")?));
        body.insert(
            "is_public".into(),
            json!(d.get_str("type").unwrap_or("public") == "public"),
        );
        body.insert("subnets".into(), Value::Array(subnets));
        let groups = d.get_string_list("security_groups");
        if !groups.is_empty() {
            body.insert(
                "security_groups".into(),
                groups.iter().map(|id| json!({ "id": id })).collect(),
            );
        }
        if let Some(profile) = d.get_str("profile") {
            body.insert("profile".into(), json!({ "name": profile }));
        }
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let lb: LoadBalancer = self
            .ctx
            .vpc()
            .create(paths::LOAD_BALANCERS, &Value::Object(body))
            .await?;
        tracing::info!("Created load balancer {} ({})", lb.name, lb.id);
        d.set_id(lb.id.as_str());

        let lb = wait_lb_active(&self.ctx, &lb.id, d.timeout(Operation::Create)).await?;
        common::apply_tags(&self.ctx, d, &lb.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = lb_path(d.id());
        let Some(lb) = common::read_or_clear::<LoadBalancer>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        d.set("name", lb.name.as_str());
        d.set("type", if lb.is_public { "public" } else { "private" });
        d.set("subnets", flatten_string_set(lb.subnets.iter().map(|s| s.id.clone())));
        d.set(
            "security_groups",
            flatten_string_set(lb.security_groups.iter().map(|s| s.id.clone())),
        );
        if let Some(profile) = lb.profile.as_ref().filter(|p| p.name == "network-fixed") {
            d.set("profile", profile.name.as_str());
        }
        d.set("hostname", lb.hostname.as_str());
        d.set(
            "public_ips",
            lb.public_ips.iter().map(|ip| ip.address.clone()).collect::<Vec<_>>(),
        );
        d.set(
            "private_ips",
            lb.private_ips.iter().map(|ip| ip.address.clone()).collect::<Vec<_>>(),
        );
        d.set("operating_status", lb.operating_status.as_str());
        d.set("status", lb.provisioning_status.as_str());
        d.set("resource_group", lb.resource_group.id.as_str());
        d.set("crn", lb.crn.as_str());
        common::read_tags(&self.ctx, d, &lb.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            let id = d.id().to_string();
            let _: LoadBalancer = self
                .ctx
                .vpc()
                .update(&lb_path(&id), &json!({"name": d.require_str("name")?}))
                .await?;
            wait_lb_active(&self.ctx, &id, d.timeout(Operation::Update)).await?;
        }
        if d.has_change("tags") {
            let crn = d.require_str("crn")?.to_string();
            common::apply_tags(&self.ctx, d, &crn).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let path = lb_path(d.id());
        if common::delete_vpc_object(&self.ctx, &path).await? {
            common::wait_for_deleted(&self.ctx, &path, d.timeout(Operation::Delete), provisioning_of)
                .await?;
        }
        d.clear_id();
        Ok(())
    }
}
