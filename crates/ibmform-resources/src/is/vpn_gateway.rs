//! `ibm_is_vpn_gateway` resource

use crate::common::{self, crn_attr, resource_group_attr, status_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{VpnGateway, paths};
use ibmform_provider::{
    Attribute, Operation, Resource, ResourceData, Result, Schema, Timeouts, Validator,
};
use serde_json::{Map, Value, json};

const PENDING: &[&str] = &["pending"];
const AVAILABLE: &[&str] = &["available", "running", "failed"];

fn path(id: &str) -> String {
    format!("{}/{}", paths::VPN_GATEWAYS, id)
}

fn status_of(gateway: &VpnGateway) -> &str {
    &gateway.status
}

/// Site-to-site VPN gateway in a subnet
pub struct IsVpnGateway {
    ctx: Context,
}

impl IsVpnGateway {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsVpnGateway {
    fn type_name(&self) -> &'static str {
        "ibm_is_vpn_gateway"
    }

    fn schema(&self) -> Schema {
        let member = Schema::new()
            .attr("address", Attribute::string().computed())
            .attr("private_address", Attribute::string().computed())
            .attr("role", Attribute::string().computed())
            .attr("status", Attribute::string().computed());

        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr("subnet", Attribute::string().required().force_new())
            .attr(
                "mode",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("route")
                    .validate(Validator::OneOf(&["route", "policy"])),
            )
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("public_ip_address", Attribute::string().computed())
            .attr("public_ip_address2", Attribute::string().computed())
            .attr("members", Attribute::block(member).computed())
            .attr("created_at", Attribute::string().computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(60, 60, 60)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let mut body = Map::new();
        body.insert("name".into(), json!(d.require_str("name")?));
        body.insert("subnet".into(), json!({ "id": d.require_str("subnet")? }));
        body.insert("mode".into(), json!(d.get_str("mode").unwrap_or("route")));
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let gateway: VpnGateway = self
            .ctx
            .vpc()
            .create(paths::VPN_GATEWAYS, &Value::Object(body))
            .await?;
        tracing::info!("Created VPN gateway {} ({})", gateway.name, gateway.id);
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
            common::read_or_clear::<VpnGateway>(&self.ctx, d, &object_path).await?
        else {
            return Ok(());
        };
        d.set("name", gateway.name.as_str());
        d.set("subnet", gateway.subnet.id.as_str());
        if !gateway.mode.is_empty() {
            d.set("mode", gateway.mode.as_str());
        }
        d.set("resource_group", gateway.resource_group.id.as_str());
        d.set("status", gateway.status.as_str());
        d.set("crn", gateway.crn.as_str());
        d.set("created_at", gateway.created_at.map(|t| t.to_rfc3339()));

        let mut public = gateway.members.iter().map(|m| m.public_ip.address.clone());
        d.set("public_ip_address", public.next());
        d.set("public_ip_address2", public.next());
        let members: Vec<Value> = gateway
            .members
            .iter()
            .map(|m| {
                json!({
                    "address": m.public_ip.address,
                    "private_address": m.private_ip.as_ref().map(|ip| ip.address.clone()),
                    "role": m.role,
                    "status": m.status,
                })
            })
            .collect();
        d.set("members", members);

        common::read_tags(&self.ctx, d, &gateway.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            let _: VpnGateway = self
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, mount_tags, obj};
    use wiremock::matchers::{body_json, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_body(status: &str) -> Value {
        json!({
            "id": "vpn-1",
            "crn": "crn:v1:vpn-1",
            "name": "site-a",
            "status": status,
            "mode": "policy",
            "subnet": {"id": "s-1"},
            "members": [
                {"public_ip": {"address": "169.61.1.1"}, "private_ip": {"address": "10.240.0.5"}, "role": "active", "status": "available"},
                {"public_ip": {"address": "169.61.1.2"}, "role": "standby", "status": "available"}
            ]
        })
    }

    #[test]
    fn test_default_timeouts() {
        let res = IsVpnGateway::new(crate::common::testing::offline_context());
        assert_eq!(res.timeouts().get(Operation::Create).as_secs(), 3600);
    }

    #[tokio::test]
    async fn test_create_policy_gateway() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/vpn_gateways"))
            .and(body_json(json!({
                "name": "site-a",
                "subnet": {"id": "s-1"},
                "mode": "policy",
                "resource_group": {"id": "rg-default"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(gateway_body("pending")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/vpn_gateways/vpn-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gateway_body("available")))
            .mount(&server)
            .await;

        let res = IsVpnGateway::new(context(&server));
        let mut d = ResourceData::new(obj(json!({"name": "site-a", "subnet": "s-1", "mode": "policy"})));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.get_str("public_ip_address"), Some("169.61.1.1"));
        assert_eq!(d.get_str("public_ip_address2"), Some("169.61.1.2"));
        assert_eq!(d.get_blocks("members")[0]["private_address"], "10.240.0.5");
        assert!(d.get_blocks("members")[1]["private_address"].is_null());
    }
}
