//! `ibm_is_lb_listener` resource

use super::lb::{lb_path, pool_id, wait_lb_active};
use crate::common;
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::LoadBalancerListener;
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator, id,
};
use serde_json::{Map, Value, json};

fn listener_path(lb: &str, listener: &str) -> String {
    format!("{}/listeners/{}", lb_path(lb), listener)
}

/// Front-end port of a load balancer
pub struct IsLbListener {
    ctx: Context,
}

impl IsLbListener {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    fn patch(d: &ResourceData) -> Map<String, Value> {
        let mut patch = Map::new();
        if d.has_change("port") {
            patch.insert("port".into(), json!(d.get_i64("port")));
        }
        if d.has_change("protocol") {
            patch.insert("protocol".into(), json!(d.get_str("protocol")));
        }
        if d.has_change("default_pool") {
            patch.insert(
                "default_pool".into(),
                d.get_str("default_pool")
                    .map(|p| json!({ "id": pool_id(p) }))
                    .unwrap_or(Value::Null),
            );
        }
        if d.has_change("certificate_instance") {
            patch.insert(
                "certificate_instance".into(),
                d.get_str("certificate_instance")
                    .map(|crn| json!({ "crn": crn }))
                    .unwrap_or(Value::Null),
            );
        }
        if d.has_change("connection_limit") {
            patch.insert("connection_limit".into(), json!(d.get_i64("connection_limit")));
        }
        patch
    }
}

#[async_trait]
impl Resource for IsLbListener {
    fn type_name(&self) -> &'static str {
        "ibm_is_lb_listener"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("lb", Attribute::string().required().force_new())
            .attr(
                "port",
                Attribute::int().required().validate(Validator::IntBetween(1, 65535)),
            )
            .attr(
                "protocol",
                Attribute::string()
                    .required()
                    .validate(Validator::OneOf(&["http", "https", "tcp"])),
            )
            .attr(
                "default_pool",
                Attribute::string()
                    .optional()
                    .describe("Pool id, bare or as lb/pool"),
            )
            .attr(
                "certificate_instance",
                Attribute::string()
                    .optional()
                    .describe("Certificate CRN, required for https"),
            )
            .attr(
                "connection_limit",
                Attribute::int()
                    .optional()
                    .validate(Validator::IntBetween(1, 15000)),
            )
            .attr("listener_id", Attribute::string().computed())
            .attr("status", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let lb = d.require_str("lb")?.to_string();
        let protocol = d.require_str("protocol")?;
        if protocol == "https" && d.get_str("certificate_instance").is_none() {
            return Err(ProviderError::InvalidConfig(
                "certificate_instance is required for https listeners".into(),
            ));
        }

        let mut body = Map::new();
        body.insert("port".into(), json!(d.require_i64("port")?));
        body.insert("protocol".into(), json!(protocol));
        if let Some(pool) = d.get_str("default_pool") {
            body.insert("default_pool".into(), json!({ "id": pool_id(pool) }));
        }
        if let Some(crn) = d.get_str("certificate_instance") {
            body.insert("certificate_instance".into(), json!({ "crn": crn }));
        }
        if let Some(limit) = d.get_i64("connection_limit") {
            body.insert("connection_limit".into(), json!(limit));
        }

        let timeout = d.timeout(Operation::Create);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        let listener: LoadBalancerListener = self
            .ctx
            .vpc()
            .create(&format!("{}/listeners", lb_path(&lb)), &Value::Object(body))
            .await?;
        tracing::info!("Created listener {} on load balancer {}", listener.id, lb);
        d.set_id(id::compose(&[&lb, &listener.id], id::LB));

        wait_lb_active(&self.ctx, &lb, timeout).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, listener_id] = id::parse::<2>(d.id(), id::LB)?.map(str::to_string);
        let path = listener_path(&lb, &listener_id);
        let Some(listener) = common::read_or_clear::<LoadBalancerListener>(&self.ctx, d, &path).await? else {
            return Ok(());
        };
        d.set("lb", lb);
        d.set("listener_id", listener.id.as_str());
        d.set("port", listener.port);
        d.set("protocol", listener.protocol.as_str());
        d.set("default_pool", listener.default_pool.map(|p| p.id));
        d.set("certificate_instance", listener.certificate_instance.map(|c| c.crn));
        d.set("connection_limit", listener.connection_limit);
        d.set("status", listener.provisioning_status.as_str());
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let patch = Self::patch(d);
        if !patch.is_empty() {
            let [lb, listener_id] = id::parse::<2>(d.id(), id::LB)?.map(str::to_string);
            let timeout = d.timeout(Operation::Update);
            wait_lb_active(&self.ctx, &lb, timeout).await?;
            let _: LoadBalancerListener = self
                .ctx
                .vpc()
                .update(&listener_path(&lb, &listener_id), &Value::Object(patch))
                .await?;
            wait_lb_active(&self.ctx, &lb, timeout).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, listener_id] = id::parse::<2>(d.id(), id::LB)?.map(str::to_string);
        let timeout = d.timeout(Operation::Delete);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        if common::delete_vpc_object(&self.ctx, &listener_path(&lb, &listener_id)).await? {
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

    fn listener_body(port: i64) -> Value {
        json!({
            "id": "lis-1",
            "port": port,
            "protocol": "http",
            "default_pool": {"id": "pool-1"},
            "provisioning_status": "active"
        })
    }

    #[tokio::test]
    async fn test_create_uses_pool_from_composite_id() {
        let server = MockServer::start().await;
        mount_active_lb(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/load_balancers/lb-1/listeners"))
            .and(body_json(json!({
                "port": 80,
                "protocol": "http",
                "default_pool": {"id": "pool-1"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(listener_body(80)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/load_balancers/lb-1/listeners/lis-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listener_body(80)))
            .mount(&server)
            .await;

        let res = IsLbListener::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "lb": "lb-1",
            "port": 80,
            "protocol": "http",
            "default_pool": "lb-1/pool-1"
        })));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.id(), "lb-1/lis-1");
        assert_eq!(d.get_str("listener_id"), Some("lis-1"));
        assert_eq!(d.get_str("status"), Some("active"));
    }

    #[tokio::test]
    async fn test_https_requires_certificate() {
        let res = IsLbListener::new(crate::common::testing::offline_context());
        let mut d = ResourceData::new(obj(json!({"lb": "lb-1", "port": 443, "protocol": "https"})));
        let err = res.create(&mut d).await.unwrap_err();
        assert!(err.to_string().contains("certificate_instance"));
    }

    #[tokio::test]
    async fn test_update_patches_only_port() {
        let server = MockServer::start().await;
        mount_active_lb(&server).await;
        Mock::given(method("PATCH"))
            .and(url_path("/v1/load_balancers/lb-1/listeners/lis-1"))
            .and(body_json(json!({"port": 8080})))
            .respond_with(ResponseTemplate::new(200).set_body_json(listener_body(8080)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/load_balancers/lb-1/listeners/lis-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listener_body(8080)))
            .mount(&server)
            .await;

        let prior = obj(json!({"lb": "lb-1", "port": 80, "protocol": "http", "default_pool": "pool-1"}));
        let planned = obj(json!({"lb": "lb-1", "port": 8080, "protocol": "http", "default_pool": "pool-1"}));
        let mut d = ResourceData::for_update("lb-1/lis-1", prior, planned);
        IsLbListener::new(context(&server)).update(&mut d).await.unwrap();
        assert_eq!(d.get_i64("port"), Some(8080));
    }

    #[tokio::test]
    async fn test_malformed_id() {
        let res = IsLbListener::new(crate::common::testing::offline_context());
        let mut d = ResourceData::from_state("lis-1", Map::new());
        assert!(res.read(&mut d).await.is_err());
    }
}
