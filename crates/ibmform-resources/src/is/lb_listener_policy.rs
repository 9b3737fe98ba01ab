//! `ibm_is_lb_listener_policy` resource

use super::lb::{lb_path, pool_id, wait_lb_active};
use crate::common::{self, status_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{LoadBalancerListenerPolicy, LoadBalancerListenerPolicyRule};
use ibmform_provider::{
    Attribute, Operation, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator, id,
};
use serde_json::{Map, Value, json};
use std::time::Duration;

const PENDING: &[&str] = &["create_pending", "update_pending"];
const ACTIVE: &[&str] = &["active", "failed"];

fn policies_path(lb: &str, listener: &str) -> String {
    format!("{}/listeners/{}/policies", lb_path(lb), listener)
}

fn policy_path(lb: &str, listener: &str, policy: &str) -> String {
    format!("{}/{}", policies_path(lb, listener), policy)
}

fn provisioning_of(policy: &LoadBalancerListenerPolicy) -> &str {
    &policy.provisioning_status
}

fn rule_schema() -> Schema {
    Schema::new()
        .attr(
            "condition",
            Attribute::string()
                .required()
                .validate(Validator::OneOf(&["contains", "equals", "matches_regex"])),
        )
        .attr(
            "type",
            Attribute::string()
                .required()
                .validate(Validator::OneOf(&["header", "hostname", "path"])),
        )
        .attr(
            "value",
            Attribute::string()
                .required()
                .validate(Validator::StringLenBetween(1, 128)),
        )
        .attr(
            "field",
            Attribute::string()
                .optional()
                .validate(Validator::StringLenBetween(1, 128))
                .describe("HTTP header name, header rules only"),
        )
        .attr("id", Attribute::string().computed())
}

/// Request body for the policy target of `action`
fn target(d: &ResourceData, action: &str) -> Result<Option<Value>> {
    match action {
        "forward" => {
            let pool = d.get_str("target_id").ok_or_else(|| {
                ProviderError::InvalidConfig("target_id is required for forward policies".into())
            })?;
            Ok(Some(json!({ "id": pool_id(pool) })))
        }
        "redirect" => match (d.get_i64("target_http_status_code"), d.get_str("target_url")) {
            (Some(code), Some(url)) => Ok(Some(json!({ "http_status_code": code, "url": url }))),
            _ => Err(ProviderError::InvalidConfig(
                "target_http_status_code and target_url are required for redirect policies".into(),
            )),
        },
        _ => Ok(None),
    }
}

fn rule_body(rule: &Map<String, Value>) -> Value {
    let mut body = Map::new();
    for key in ["condition", "type", "value", "field"] {
        if let Some(v) = rule.get(key).filter(|v| !v.is_null()) {
            body.insert(key.into(), v.clone());
        }
    }
    Value::Object(body)
}

/// Layer 7 routing rule set on an HTTP listener
pub struct IsLbListenerPolicy {
    ctx: Context,
}

impl IsLbListenerPolicy {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    async fn wait_active(&self, path: &str, timeout: Duration) -> Result<LoadBalancerListenerPolicy> {
        common::wait_for_state(&self.ctx, path, PENDING, ACTIVE, timeout, provisioning_of).await
    }

    async fn read_rules(&self, path: &str, policy: &LoadBalancerListenerPolicy) -> Result<Vec<Value>> {
        let mut rules = Vec::with_capacity(policy.rules.len());
        for reference in &policy.rules {
            let rule: LoadBalancerListenerPolicyRule = self
                .ctx
                .vpc()
                .get(&format!("{}/rules/{}", path, reference.id))
                .await?;
            rules.push(json!({
                "condition": rule.condition,
                "type": rule.rule_type,
                "value": rule.value,
                "field": rule.field,
                "id": rule.id,
            }));
        }
        Ok(rules)
    }
}

#[async_trait]
impl Resource for IsLbListenerPolicy {
    fn type_name(&self) -> &'static str {
        "ibm_is_lb_listener_policy"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("lb", Attribute::string().required().force_new())
            .attr(
                "listener",
                Attribute::string()
                    .required()
                    .force_new()
                    .describe("Listener id, bare or as lb/listener"),
            )
            .attr(
                "action",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(Validator::OneOf(&["forward", "redirect", "reject"])),
            )
            .attr(
                "priority",
                Attribute::int().required().validate(Validator::IntBetween(1, 10)),
            )
            .attr("name", Attribute::string().optional().computed())
            .attr("rules", Attribute::block(rule_schema()).optional().force_new())
            .attr(
                "target_id",
                Attribute::string()
                    .optional()
                    .describe("Pool to forward to, bare or as lb/pool"),
            )
            .attr(
                "target_http_status_code",
                Attribute::int()
                    .optional()
                    .validate(Validator::IntBetween(301, 308)),
            )
            .attr("target_url", Attribute::string().optional())
            .attr("policy_id", Attribute::string().computed())
            .attr("status", status_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(60, 60, 60)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let lb = d.require_str("lb")?.to_string();
        let listener = pool_id(d.require_str("listener")?).to_string();
        let action = d.require_str("action")?.to_string();

        let mut body = Map::new();
        body.insert("action".into(), json!(action));
        body.insert("priority".into(), json!(d.require_i64("priority")?));
        if let Some(name) = d.get_str("name") {
            body.insert("name".into(), json!(name));
        }
        if let Some(target) = target(d, &action)? {
            body.insert("target".into(), target);
        }
        let rules: Vec<Value> = d.get_blocks("rules").into_iter().map(rule_body).collect();
        if !rules.is_empty() {
            body.insert("rules".into(), Value::Array(rules));
        }

        let timeout = d.timeout(Operation::Create);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        let policy: LoadBalancerListenerPolicy = self
            .ctx
            .vpc()
            .create(&policies_path(&lb, &listener), &Value::Object(body))
            .await?;
        tracing::info!("Created policy {} on listener {}", policy.id, listener);
        d.set_id(id::compose(&[&lb, &listener, &policy.id], id::LB));

        self.wait_active(&policy_path(&lb, &listener, &policy.id), timeout)
            .await?;
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, listener, policy_id] = id::parse::<3>(d.id(), id::LB)?.map(str::to_string);
        let path = policy_path(&lb, &listener, &policy_id);
        let Some(policy) = common::read_or_clear::<LoadBalancerListenerPolicy>(&self.ctx, d, &path).await? else {
            return Ok(());
        };

        d.set("lb", lb);
        // keep the form the listener was configured in
        if d.get_str("listener").map(pool_id) != Some(listener.as_str()) {
            d.set("listener", listener.as_str());
        }
        d.set("policy_id", policy.id.as_str());
        d.set("action", policy.action.as_str());
        d.set("priority", policy.priority);
        d.set("name", policy.name.as_str());
        d.set("status", policy.provisioning_status.as_str());
        d.set("rules", self.read_rules(&path, &policy).await?);

        let target = policy.target.unwrap_or_default();
        match policy.action.as_str() {
            "forward" => {
                if let Some(pool) = target.id {
                    if d.get_str("target_id").map(pool_id) != Some(pool.as_str()) {
                        d.set("target_id", pool);
                    }
                }
            }
            "redirect" => {
                d.set("target_http_status_code", target.http_status_code);
                d.set("target_url", target.url);
            }
            _ => {}
        }
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let mut patch = Map::new();
        if d.has_change("name") {
            patch.insert("name".into(), json!(d.get_str("name")));
        }
        if d.has_change("priority") {
            patch.insert("priority".into(), json!(d.require_i64("priority")?));
        }
        if d.has_changes(&["target_id", "target_http_status_code", "target_url"]) {
            let action = d.require_str("action")?.to_string();
            if let Some(target) = target(d, &action)? {
                patch.insert("target".into(), target);
            }
        }

        if !patch.is_empty() {
            let [lb, listener, policy_id] = id::parse::<3>(d.id(), id::LB)?.map(str::to_string);
            let path = policy_path(&lb, &listener, &policy_id);
            let timeout = d.timeout(Operation::Update);
            wait_lb_active(&self.ctx, &lb, timeout).await?;
            let _: LoadBalancerListenerPolicy = self
                .ctx
                .vpc()
                .update(&path, &Value::Object(patch))
                .await?;
            self.wait_active(&path, timeout).await?;
            wait_lb_active(&self.ctx, &lb, timeout).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let [lb, listener, policy_id] = id::parse::<3>(d.id(), id::LB)?.map(str::to_string);
        let path = policy_path(&lb, &listener, &policy_id);
        let timeout = d.timeout(Operation::Delete);
        wait_lb_active(&self.ctx, &lb, timeout).await?;
        if common::delete_vpc_object(&self.ctx, &path).await? {
            common::wait_for_deleted(&self.ctx, &path, timeout, provisioning_of).await?;
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

    const POLICY_PATH: &str = "/v1/load_balancers/lb-1/listeners/lis-1/policies/pol-1";

    fn policy_body(priority: i64) -> Value {
        json!({
            "id": "pol-1",
            "name": "api-route",
            "action": "forward",
            "priority": priority,
            "provisioning_status": "active",
            "rules": [{"id": "rule-1"}],
            "target": {"id": "pool-1"}
        })
    }

    async fn mount_policy(server: &MockServer, priority: i64) {
        Mock::given(method("GET"))
            .and(url_path(POLICY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(policy_body(priority)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(url_path(format!("{}/rules/rule-1", POLICY_PATH).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "rule-1",
                "condition": "contains",
                "type": "path",
                "value": "/api",
                "provisioning_status": "active"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_forward_policy_create() {
        let server = MockServer::start().await;
        mount_active_lb(&server).await;
        mount_policy(&server, 2).await;
        Mock::given(method("POST"))
            .and(url_path("/v1/load_balancers/lb-1/listeners/lis-1/policies"))
            .and(body_json(json!({
                "action": "forward",
                "priority": 2,
                "name": "api-route",
                "target": {"id": "pool-1"},
                "rules": [{"condition": "contains", "type": "path", "value": "/api"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(policy_body(2)))
            .expect(1)
            .mount(&server)
            .await;

        let res = IsLbListenerPolicy::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "lb": "lb-1",
            "listener": "lb-1/lis-1",
            "action": "forward",
            "priority": 2,
            "name": "api-route",
            "target_id": "lb-1/pool-1",
            "rules": [{"condition": "contains", "type": "path", "value": "/api"}]
        })));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.id(), "lb-1/lis-1/pol-1");
        assert_eq!(d.get_str("listener"), Some("lb-1/lis-1"));
        assert_eq!(d.get_str("target_id"), Some("lb-1/pool-1"));
        assert_eq!(d.get_blocks("rules")[0]["id"], "rule-1");
        assert_eq!(d.get_str("status"), Some("active"));
    }

    #[tokio::test]
    async fn test_target_required_by_action() {
        let res = IsLbListenerPolicy::new(offline_context());
        let mut d = ResourceData::new(obj(json!({
            "lb": "lb-1",
            "listener": "lis-1",
            "action": "forward",
            "priority": 1
        })));
        let err = res.create(&mut d).await.unwrap_err();
        assert!(err.to_string().contains("target_id"));

        let mut d = ResourceData::new(obj(json!({
            "lb": "lb-1",
            "listener": "lis-1",
            "action": "redirect",
            "priority": 1,
            "target_url": "https://example.com"
        })));
        let err = res.create(&mut d).await.unwrap_err();
        assert!(err.to_string().contains("target_http_status_code"));
    }

    #[tokio::test]
    async fn test_update_patches_priority() {
        let server = MockServer::start().await;
        mount_active_lb(&server).await;
        mount_policy(&server, 5).await;
        Mock::given(method("PATCH"))
            .and(url_path(POLICY_PATH))
            .and(body_json(json!({"priority": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(policy_body(5)))
            .expect(1)
            .mount(&server)
            .await;

        let prior = obj(json!({
            "lb": "lb-1", "listener": "lis-1", "action": "forward",
            "priority": 2, "target_id": "pool-1"
        }));
        let planned = obj(json!({
            "lb": "lb-1", "listener": "lis-1", "action": "forward",
            "priority": 5, "target_id": "pool-1"
        }));
        let mut d = ResourceData::for_update("lb-1/lis-1/pol-1", prior, planned);
        IsLbListenerPolicy::new(context(&server)).update(&mut d).await.unwrap();
        assert_eq!(d.get_i64("priority"), Some(5));
    }

    #[tokio::test]
    async fn test_read_clears_missing_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path(POLICY_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut d = ResourceData::from_state("lb-1/lis-1/pol-1", Map::new());
        IsLbListenerPolicy::new(context(&server)).read(&mut d).await.unwrap();
        assert_eq!(d.id(), "");
    }

    #[test]
    fn test_rule_body_drops_computed_id() {
        let rule = obj(json!({"condition": "equals", "type": "header", "field": "x-env", "value": "qa", "id": "rule-1"}));
        assert_eq!(
            rule_body(&rule),
            json!({"condition": "equals", "type": "header", "field": "x-env", "value": "qa"})
        );
    }
}
