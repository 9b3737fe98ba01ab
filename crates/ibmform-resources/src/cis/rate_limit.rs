//! `ibm_cis_rate_limit` resource

use super::{cis_id_attr, domain_id_attr, found, ignore_gone, parse_id, set_location, zone_id};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::cis::{
    RateLimit, RateLimitAction, RateLimitActionResponse, RateLimitBypass, RateLimitCorrelate,
    RateLimitHeader, RateLimitMatch, RateLimitMatchRequest, RateLimitMatchResponse,
};
use ibmform_provider::flex::{expand_strings, flatten_string_set};
use ibmform_provider::{
    Attribute, AttributeType, ProviderError, Resource, ResourceData, Result, Schema, Timeouts,
    Validator, id,
};
use serde_json::{Map, Value, json};

const MODES: &[&str] = &["simulate", "ban", "challenge", "js_challenge"];
const CONTENT_TYPES: &[&str] = &["text/plain", "text/xml", "application/json"];
const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "_ALL_"];
const SCHEMES: &[&str] = &["HTTP", "HTTPS", "_ALL_"];

fn block_str(block: &Map<String, Value>, key: &str) -> Option<String> {
    block
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_block<'a>(block: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    block
        .get(key)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
}

fn expand_action(block: &Map<String, Value>) -> Result<RateLimitAction> {
    let mode = block_str(block, "mode")
        .ok_or_else(|| ProviderError::InvalidConfig("action.mode is required".into()))?;
    let timeout = block.get("timeout").and_then(Value::as_i64).filter(|t| *t > 0);
    let response = first_block(block, "response").map(|r| RateLimitActionResponse {
        content_type: block_str(r, "content_type").unwrap_or_default(),
        body: block_str(r, "body").unwrap_or_default(),
    });

    match mode.as_str() {
        "simulate" | "ban" if timeout.is_none() => Err(ProviderError::InvalidConfig(format!(
            "action.timeout is required for mode '{}'",
            mode
        ))),
        "challenge" | "js_challenge" if timeout.is_some() || response.is_some() => {
            Err(ProviderError::InvalidConfig(format!(
                "action.timeout and action.response are only valid for 'simulate' and 'ban', not '{}'",
                mode
            )))
        }
        _ => Ok(RateLimitAction {
            mode,
            timeout,
            response,
        }),
    }
}

fn sorted(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items
}

fn expand_match(block: Option<&Map<String, Value>>) -> RateLimitMatch {
    let Some(block) = block else {
        return RateLimitMatch::default();
    };
    let request = first_block(block, "request").map(|r| RateLimitMatchRequest {
        methods: sorted(expand_strings(r.get("methods"))),
        schemes: sorted(expand_strings(r.get("schemes"))),
        url: block_str(r, "url").unwrap_or_default(),
    });
    let response = first_block(block, "response").map(|r| RateLimitMatchResponse {
        status: r
            .get("status")
            .and_then(Value::as_array)
            .map(|codes| codes.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default(),
        headers: r
            .get("headers")
            .and_then(Value::as_array)
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|h| RateLimitHeader {
                        name: block_str(h, "name").unwrap_or_default(),
                        op: block_str(h, "op").unwrap_or_else(|| "eq".to_string()),
                        value: block_str(h, "value").unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        origin_traffic: r.get("origin_traffic").and_then(Value::as_bool),
    });
    RateLimitMatch { request, response }
}

fn expand(d: &ResourceData) -> Result<RateLimit> {
    let action = d
        .get_block("action")
        .ok_or_else(|| ProviderError::InvalidConfig("an action block is required".into()))?;
    Ok(RateLimit {
        id: String::new(),
        disabled: d.get_bool("disabled").unwrap_or(false),
        description: d.get_str("description").unwrap_or_default().to_string(),
        bypass: d
            .get_blocks("bypass")
            .into_iter()
            .map(|b| RateLimitBypass {
                name: block_str(b, "name").unwrap_or_else(|| "url".to_string()),
                value: block_str(b, "value").unwrap_or_default(),
            })
            .collect(),
        threshold: d.require_i64("threshold")?,
        period: d.require_i64("period")?,
        correlate: d.get_block("correlate").map(|c| RateLimitCorrelate {
            by: block_str(c, "by").unwrap_or_else(|| "nat".to_string()),
        }),
        action: expand_action(action)?,
        match_: expand_match(d.get_block("match")),
    })
}

fn flatten_action(action: &RateLimitAction) -> Value {
    let mut block = Map::new();
    block.insert("mode".into(), json!(action.mode));
    if let Some(timeout) = action.timeout {
        block.insert("timeout".into(), json!(timeout));
    }
    if let Some(response) = &action.response {
        block.insert(
            "response".into(),
            json!([{ "content_type": response.content_type, "body": response.body }]),
        );
    }
    json!([block])
}

fn flatten_match(rule_match: &RateLimitMatch) -> Value {
    let mut block = Map::new();
    if let Some(request) = &rule_match.request {
        block.insert(
            "request".into(),
            json!([{
                "methods": flatten_string_set(request.methods.iter().cloned()),
                "schemes": flatten_string_set(request.schemes.iter().cloned()),
                "url": request.url,
            }]),
        );
    }
    if let Some(response) = &rule_match.response {
        let mut status = response.status.clone();
        status.sort_unstable();
        status.dedup();
        let headers: Vec<Value> = response
            .headers
            .iter()
            .map(|h| json!({ "name": h.name, "op": h.op, "value": h.value }))
            .collect();
        block.insert(
            "response".into(),
            json!([{
                "status": status,
                "headers": headers,
                "origin_traffic": response.origin_traffic,
            }]),
        );
    }
    if block.is_empty() {
        Value::Null
    } else {
        json!([block])
    }
}

/// Rate limiting rule for a CIS zone
pub struct CisRateLimit {
    ctx: Context,
}

impl CisRateLimit {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for CisRateLimit {
    fn type_name(&self) -> &'static str {
        "ibm_cis_rate_limit"
    }

    fn schema(&self) -> Schema {
        let bypass = Schema::new()
            .attr("name", Attribute::string().optional().default("url"))
            .attr("value", Attribute::string().optional());

        let correlate = Schema::new().attr(
            "by",
            Attribute::string()
                .optional()
                .default("nat")
                .validate(Validator::OneOf(&["nat"])),
        );

        let action_response = Schema::new()
            .attr(
                "content_type",
                Attribute::string()
                    .required()
                    .validate(Validator::OneOf(CONTENT_TYPES)),
            )
            .attr(
                "body",
                Attribute::string()
                    .required()
                    .validate(Validator::StringLenBetween(0, 10240)),
            );
        let action = Schema::new()
            .attr(
                "mode",
                Attribute::string().required().validate(Validator::OneOf(MODES)),
            )
            .attr(
                "timeout",
                Attribute::int()
                    .optional()
                    .validate(Validator::IntBetween(1, 86400))
                    .describe("Seconds to apply the action; simulate and ban only"),
            )
            .attr(
                "response",
                Attribute::block(action_response).optional().max_items(1),
            );

        let request = Schema::new()
            .attr(
                "methods",
                Attribute::string_set()
                    .optional()
                    .validate(Validator::OneOf(METHODS)),
            )
            .attr(
                "schemes",
                Attribute::string_set()
                    .optional()
                    .validate(Validator::OneOf(SCHEMES)),
            )
            .attr(
                "url",
                Attribute::string()
                    .optional()
                    .validate(Validator::StringLenBetween(0, 1024)),
            );
        let header = Schema::new()
            .attr("name", Attribute::string().optional())
            .attr(
                "op",
                Attribute::string()
                    .optional()
                    .validate(Validator::OneOf(&["eq", "ne"])),
            )
            .attr("value", Attribute::string().optional());
        let response = Schema::new()
            .attr(
                "status",
                Attribute::new(AttributeType::Set(Box::new(AttributeType::Int))).optional(),
            )
            .attr("origin_traffic", Attribute::bool().optional())
            .attr("headers", Attribute::block(header).optional());
        let rule_match = Schema::new()
            .attr("request", Attribute::block(request).optional().max_items(1))
            .attr("response", Attribute::block(response).optional().max_items(1));

        Schema::new()
            .attr("cis_id", cis_id_attr())
            .attr("domain_id", domain_id_attr())
            .attr("disabled", Attribute::bool().optional().default(false))
            .attr(
                "description",
                Attribute::string()
                    .optional()
                    .validate(Validator::StringLenBetween(0, 1024)),
            )
            .attr("bypass", Attribute::block(bypass).optional())
            .attr(
                "threshold",
                Attribute::int()
                    .required()
                    .validate(Validator::IntBetween(1, 1_000_000)),
            )
            .attr(
                "period",
                Attribute::int()
                    .required()
                    .validate(Validator::IntBetween(1, 86400)),
            )
            .attr(
                "correlate",
                Attribute::block(correlate).optional().max_items(1),
            )
            .attr("action", Attribute::block(action).required().max_items(1))
            .attr("match", Attribute::block(rule_match).optional().max_items(1))
            .attr("rule_id", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let crn = d.require_str("cis_id")?.to_string();
        let zone = zone_id(d.require_str("domain_id")?).to_string();
        let rule = expand(d)?;

        let created = self.ctx.cis().create_rate_limit(&crn, &zone, &rule).await?;
        if created.id.is_empty() {
            return Err(ProviderError::api("rate limit create returned no id"));
        }
        tracing::info!("Created rate limit {} in zone {}", created.id, zone);
        d.set_id(id::compose(&[&created.id, &zone, &crn], id::CIS));
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let (rule_id, zone, crn) = parse_id(d)?;
        let result = self.ctx.cis().get_rate_limit(&crn, &zone, &rule_id).await;
        let Some(rule) = found(d, result)? else {
            return Ok(());
        };
        set_location(d, &zone, &crn);
        d.set("rule_id", rule_id);
        d.set("disabled", rule.disabled);
        d.set("description", rule.description.as_str());
        d.set("threshold", rule.threshold);
        d.set("period", rule.period);
        d.set("action", flatten_action(&rule.action));
        d.set("match", flatten_match(&rule.match_));
        d.set(
            "correlate",
            rule.correlate.map(|c| json!([{ "by": c.by }])),
        );
        let bypass: Vec<Value> = rule
            .bypass
            .iter()
            .map(|b| json!({ "name": b.name, "value": b.value }))
            .collect();
        d.set("bypass", bypass);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let keys = [
            "disabled",
            "description",
            "bypass",
            "threshold",
            "period",
            "correlate",
            "action",
            "match",
        ];
        if d.has_changes(&keys) {
            let (rule_id, zone, crn) = parse_id(d)?;
            let rule = expand(d)?;
            self.ctx
                .cis()
                .update_rate_limit(&crn, &zone, &rule_id, &rule)
                .await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let (rule_id, zone, crn) = parse_id(d)?;
        ignore_gone(self.ctx.cis().delete_rate_limit(&crn, &zone, &rule_id).await)?;
        d.clear_id();
        Ok(())
    }
}
