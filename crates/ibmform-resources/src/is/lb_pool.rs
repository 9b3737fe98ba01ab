//! `ibm_is_lb_pool` resource

use super::lb::{lb_path, wait_lb_active};
use crate::common;
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{HealthMonitor, LoadBalancerPool, SessionPersistence};
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator, id,
};
use serde_json::{Map, Value, json};

const PROTOCOLS: &[&str] = &["http", "https", "tcp"];

const HEALTH_ATTRS: &[&str] = &[
    "health_delay",
    "health_retries",
    "health_timeout",
    "health_type",
    "health_monitor_url",
    "health_monitor_port",
];

pub(crate) fn pool_path(lb: &str, pool: &str) -> String {
    format!("{}/pools/{}", lb_path(lb), pool)
}

fn health_monitor(d: &ResourceData) -> Result<HealthMonitor> {
    let delay = d.require_i64("health_delay")?;
    let timeout = d.require_i64("health_timeout")?;
    if delay <= timeout {
        return Err(ProviderError::InvalidConfig(format!(
            "health_delay ({}) must be greater than health_timeout ({})",
            delay, timeout
        )));
    }
    Ok(HealthMonitor {
        delay,
        max_retries: d.require_i64("health_retries")?,
        timeout,
        monitor_type: d.require_str("health_type")?.to_string(),
        url_path: d.get_str("health_monitor_url").map(str::to_string),
        port: d.get_i64("health_monitor_port"),
    })
}

fn session_persistence(d: &ResourceData) -> Value {
    d.get_str("session_persistence_type")
        .map(|t| {
            json!(SessionPersistence {
                persistence_type: t.to_string()
            })
        })
        .unwrap_or(Value::Null)
}

/// Backend pool of a load balancer
pub struct IsLbPool {
    ctx: Context,
}

impl IsLbPool {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsLbPool {
    fn type_name(&self) -> &'static str {
        "ibm_is_lb_pool"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("lb", Attribute::string().required().force_new())
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr(
                "algorithm",
                Attribute::string().required().validate(Validator::OneOf(&[
                    "round_robin",
                    "weighted_round_robin",
                    "least_connections",
                ])),
            )
            .attr(
                "protocol",
                Attribute::string().required().validate(Validator::OneOf(PROTOCOLS)),
            )
            .attr(
                "health_delay",
                Attribute::int()
                    .required()
                    .validate(Validator::IntBetween(2, 60))
                    .describe("Seconds between health checks, greater than health_timeout"),
            )
            .attr(
                "health_retries",
                Attribute::int().required().validate(Validator::IntBetween(1, 10)),
            )
            .attr(
                "health_timeout",
                Attribute::int().required().validate(Validator::IntBetween(1, 59)),
            )
            .attr(
                "health_type",
                Attribute::string().required().validate(Validator::OneOf(PROTOCOLS)),
            )
            .attr("health_monitor_url", Attribute::string().optional().computed())
            .attr(
                "health_monitor_port",
                Attribute::int()
                    .optional()
                    .computed()
                    .validate(Validator::IntBetween(1, 65535)),
            )
            .attr(
                "session_persistence_type",
                Attribute::string().optional().validate(Validator::OneOf(&[
                    "source_ip",
                    "http_cookie",
                    "app_cookie",
                ])),
            )
            .attr("pool_id", Attribute::string().computed())
            .attr("status", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let lb = d.require_str("lb")?.to_string();
        let mut body = Map::new();
        body.insert("name".into(), json!(d.require_str("name")?));
        body.insert("algorithm".into(), json!(d.require_str("algorithm")?));
        body.insert("protocol".into(), json!(d.require_str("protocol")?));
        body.insert("health_monitor".into(), json!(health_monitor(d)?));
        let persistence = session_persistence(d);
        if !persistence.is_null() {
            body.insert("session_persistence".into(), persistence);
        }

        let timeout = d.timeout(Operation::Create);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        let pool: LoadBalancerPool = self
            .ctx
            .vpc()
            .create(&format!("{}/pools", lb_path(&lb)), &Value::Object(body))
            .await?;
        tracing::info!("Created pool {} ({}) on load balancer {}", pool.name, pool.id, lb);
        d.set_id(id::compose(&[&lb, &pool.id], id::LB));

        wait_lb_active(&self.ctx, &lb, timeout).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, pool_id] = id::parse::<2>(d.id(), id::LB)?.map(str::to_string);
        let Some(pool) =
            common::read_or_clear::<LoadBalancerPool>(&self.ctx, d, &pool_path(&lb, &pool_id)).await?
        else {
            return Ok(());
        };
        d.set("lb", lb);
        d.set("pool_id", pool.id.as_str());
        d.set("name", pool.name.as_str());
        d.set("algorithm", pool.algorithm.as_str());
        d.set("protocol", pool.protocol.as_str());
        d.set("health_delay", pool.health_monitor.delay);
        d.set("health_retries", pool.health_monitor.max_retries);
        d.set("health_timeout", pool.health_monitor.timeout);
        d.set("health_type", pool.health_monitor.monitor_type.as_str());
        d.set("health_monitor_url", pool.health_monitor.url_path);
        d.set("health_monitor_port", pool.health_monitor.port);
        d.set(
            "session_persistence_type",
            pool.session_persistence.map(|s| s.persistence_type),
        );
        d.set("status", pool.provisioning_status.as_str());
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let mut patch = Map::new();
        for key in ["name", "algorithm", "protocol"] {
            if d.has_change(key) {
                patch.insert(key.into(), json!(d.require_str(key)?));
            }
        }
        if d.has_changes(HEALTH_ATTRS) {
            patch.insert("health_monitor".into(), json!(health_monitor(d)?));
        }
        if d.has_change("session_persistence_type") {
            patch.insert("session_persistence".into(), session_persistence(d));
        }

        if !patch.is_empty() {
            let [lb, pool_id] = id::parse::<2>(d.id(), id::LB)?.map(str::to_string);
            let timeout = d.timeout(Operation::Update);
            wait_lb_active(&self.ctx, &lb, timeout).await?;
            let _: LoadBalancerPool = self
                .ctx
                .vpc()
                .update(&pool_path(&lb, &pool_id), &Value::Object(patch))
                .await?;
            wait_lb_active(&self.ctx, &lb, timeout).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, pool_id] = id::parse::<2>(d.id(), id::LB)?.map(str::to_string);
        let timeout = d.timeout(Operation::Delete);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        if common::delete_vpc_object(&self.ctx, &pool_path(&lb, &pool_id)).await? {
            wait_lb_active(&self.ctx, &lb, timeout).await?;
        }
        d.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, obj, offline_context};
    use crate::is::lb::tests::mount_active_lb;
    use wiremock::matchers::{body_json, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> Value {
        json!({
            "lb": "lb-1",
            "name": "web-pool",
            "algorithm": "round_robin",
            "protocol": "http",
            "health_delay": 5,
            "health_retries": 2,
            "health_timeout": 2,
            "health_type": "http",
            "health_monitor_url": "/healthz"
        })
    }

    fn pool_body(delay: i64) -> Value {
        json!({
            "id": "pool-1",
            "name": "web-pool",
            "algorithm": "round_robin",
            "protocol": "http",
            "health_monitor": {"delay": delay, "max_retries": 2, "timeout": 2, "type": "http", "url_path": "/healthz"},
            "provisioning_status": "active"
        })
    }

    #[tokio::test]
    async fn test_delay_must_exceed_timeout() {
        let res = IsLbPool::new(offline_context());
        let mut cfg = config();
        cfg["health_delay"] = json!(2);
        let mut d = ResourceData::new(obj(cfg));
        let err = res.create(&mut d).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig(_)));
        assert!(err.to_string().contains("health_delay (2)"));
    }

    #[tokio::test]
    async fn test_create_pool() {
        let server = MockServer::start().await;
        mount_active_lb(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/load_balancers/lb-1/pools"))
            .and(body_json(json!({
                "name": "web-pool",
                "algorithm": "round_robin",
                "protocol": "http",
                "health_monitor": {"delay": 5, "max_retries": 2, "timeout": 2, "type": "http", "url_path": "/healthz"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(pool_body(5)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/load_balancers/lb-1/pools/pool-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pool_body(5)))
            .mount(&server)
            .await;

        let res = IsLbPool::new(context(&server));
        let mut d = ResourceData::new(obj(config()));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.id(), "lb-1/pool-1");
        assert_eq!(d.get_str("pool_id"), Some("pool-1"));
        assert!(d.get("session_persistence_type").is_none());
    }

    #[tokio::test]
    async fn test_health_change_sends_whole_monitor() {
        let server = MockServer::start().await;
        mount_active_lb(&server).await;
        Mock::given(method("PATCH"))
            .and(url_path("/v1/load_balancers/lb-1/pools/pool-1"))
            .and(body_json(json!({
                "health_monitor": {"delay": 10, "max_retries": 2, "timeout": 2, "type": "http", "url_path": "/healthz"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(pool_body(10)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/load_balancers/lb-1/pools/pool-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(pool_body(10)))
            .mount(&server)
            .await;

        let mut planned = config();
        planned["health_delay"] = json!(10);
        let mut d = ResourceData::for_update("lb-1/pool-1", obj(config()), obj(planned));
        IsLbPool::new(context(&server)).update(&mut d).await.unwrap();
        assert_eq!(d.get_i64("health_delay"), Some(10));
    }
}
