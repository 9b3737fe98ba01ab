//! `ibm_is_lb_pool_member` resource

use super::lb::{pool_id, wait_lb_active};
use super::lb_pool::pool_path;
use crate::common;
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{LoadBalancerPoolMember, MemberTarget};
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator, id,
};
use serde_json::{Map, Value, json};

fn member_path(lb: &str, pool: &str, member: &str) -> String {
    format!("{}/members/{}", pool_path(lb, pool), member)
}

fn target(d: &ResourceData) -> Result<MemberTarget> {
    let target = MemberTarget {
        address: d.get_str("target_address").map(str::to_string),
        id: d.get_str("target_id").map(str::to_string),
    };
    if target.address.is_none() && target.id.is_none() {
        return Err(ProviderError::InvalidConfig(
            "one of target_address or target_id is required".into(),
        ));
    }
    Ok(target)
}

/// Backend server in a load balancer pool
pub struct IsLbPoolMember {
    ctx: Context,
}

impl IsLbPoolMember {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsLbPoolMember {
    fn type_name(&self) -> &'static str {
        "ibm_is_lb_pool_member"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("lb", Attribute::string().required().force_new())
            .attr(
                "pool",
                Attribute::string()
                    .required()
                    .force_new()
                    .describe("Pool id, bare or as lb/pool"),
            )
            .attr(
                "port",
                Attribute::int().required().validate(Validator::IntBetween(1, 65535)),
            )
            .attr(
                "target_address",
                Attribute::string()
                    .optional()
                    .conflicts_with(&["target_id"]),
            )
            .attr(
                "target_id",
                Attribute::string()
                    .optional()
                    .conflicts_with(&["target_address"])
                    .describe("Instance id, for network load balancers"),
            )
            .attr(
                "weight",
                Attribute::int()
                    .optional()
                    .computed()
                    .validate(Validator::IntBetween(0, 100)),
            )
            .attr("member_id", Attribute::string().computed())
            .attr("health", Attribute::string().computed())
            .attr("status", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let lb = d.require_str("lb")?.to_string();
        let pool = pool_id(d.require_str("pool")?).to_string();

        let mut body = Map::new();
        body.insert("port".into(), json!(d.require_i64("port")?));
        body.insert("target".into(), json!(target(d)?));
        if let Some(weight) = d.get_i64("weight") {
            body.insert("weight".into(), json!(weight));
        }

        let timeout = d.timeout(Operation::Create);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        let member: LoadBalancerPoolMember = self
            .ctx
            .vpc()
            .create(&format!("{}/members", pool_path(&lb, &pool)), &Value::Object(body))
            .await?;
        tracing::info!("Added member {} to pool {}", member.id, pool);
        d.set_id(id::compose(&[&lb, &pool, &member.id], id::LB));

        wait_lb_active(&self.ctx, &lb, timeout).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, pool, member_id] = id::parse::<3>(d.id(), id::LB)?.map(str::to_string);
        let path = member_path(&lb, &pool, &member_id);
        let Some(member) = common::read_or_clear::<LoadBalancerPoolMember>(&self.ctx, d, &path).await? else {
            return Ok(());
        };
        d.set("lb", lb);
        if d.get_str("pool").map(pool_id) != Some(pool.as_str()) {
            d.set("pool", pool);
        }
        d.set("member_id", member.id.as_str());
        d.set("port", member.port);
        d.set("target_address", member.target.address);
        d.set("target_id", member.target.id);
        d.set("weight", member.weight);
        d.set("health", member.health.as_str());
        d.set("status", member.provisioning_status.as_str());
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let mut patch = Map::new();
        if d.has_change("port") {
            patch.insert("port".into(), json!(d.require_i64("port")?));
        }
        if d.has_changes(&["target_address", "target_id"]) {
            patch.insert("target".into(), json!(target(d)?));
        }
        if d.has_change("weight") {
            patch.insert("weight".into(), json!(d.get_i64("weight")));
        }

        if !patch.is_empty() {
            let [lb, pool, member_id] = id::parse::<3>(d.id(), id::LB)?.map(str::to_string);
            let timeout = d.timeout(Operation::Update);
            wait_lb_active(&self.ctx, &lb, timeout).await?;
            let _: LoadBalancerPoolMember = self
                .ctx
                .vpc()
                .update(&member_path(&lb, &pool, &member_id), &Value::Object(patch))
                .await?;
            wait_lb_active(&self.ctx, &lb, timeout).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, pool, member_id] = id::parse::<3>(d.id(), id::LB)?.map(str::to_string);
        let timeout = d.timeout(Operation::Delete);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        if common::delete_vpc_object(&self.ctx, &member_path(&lb, &pool, &member_id)).await? {
            wait_lb_active(&self.ctx, &lb, timeout).await?;
        }
        d.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, obj};
    use crate::is::lb::tests::mount_active_lb;
    use wiremock::matchers::{body_json, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn member_body() -> Value {
        json!({
            "id": "mem-1",
            "port": 8080,
            "target": {"address": "10.240.0.20"},
            "weight": 50,
            "health": "unknown",
            "provisioning_status": "active"
        })
    }

    #[tokio::test]
    async fn test_create_member_with_composite_pool() {
        let server = MockServer::start().await;
        mount_active_lb(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/load_balancers/lb-1/pools/pool-1/members"))
            .and(body_json(json!({"port": 8080, "target": {"address": "10.240.0.20"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(member_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/load_balancers/lb-1/pools/pool-1/members/mem-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(member_body()))
            .mount(&server)
            .await;

        let res = IsLbPoolMember::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "lb": "lb-1",
            "pool": "lb-1/pool-1",
            "port": 8080,
            "target_address": "10.240.0.20"
        })));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.id(), "lb-1/pool-1/mem-1");
        assert_eq!(d.get_str("pool"), Some("lb-1/pool-1"));
        assert_eq!(d.get_i64("weight"), Some(50));
    }

    #[tokio::test]
    async fn test_member_requires_target() {
        let res = IsLbPoolMember::new(crate::common::testing::offline_context());
        let mut d = ResourceData::new(obj(json!({"lb": "lb-1", "pool": "pool-1", "port": 80})));
        let err = res.create(&mut d).await.unwrap_err();
        assert!(err.to_string().contains("target_address"));
    }

    #[tokio::test]
    async fn test_gone_member_clears_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/v1/load_balancers/lb-1/pools/pool-1/members/mem-1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errors": [{"code": "not_found", "message": "Member not found"}]
            })))
            .mount(&server)
            .await;

        let res = IsLbPoolMember::new(context(&server));
        let mut d = ResourceData::from_state("lb-1/pool-1/mem-1", Map::new());
        res.read(&mut d).await.unwrap();
        assert_eq!(d.id(), "");
    }
}
