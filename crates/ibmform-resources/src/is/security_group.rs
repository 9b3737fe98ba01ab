//! `ibm_is_security_group` and `ibm_is_security_group_rule` resources

use crate::common::{self, crn_attr, resource_group_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{RuleRemote, SecurityGroup, SecurityGroupRule, paths};
use ibmform_provider::{
    Attribute, Resource, ResourceData, Result, Schema, Validator, id,
};
use serde_json::{Map, Value, json};

fn group_path(id: &str) -> String {
    format!("{}/{}", paths::SECURITY_GROUPS, id)
}

fn rule_path(group: &str, rule: &str) -> String {
    format!("{}/{}/rules/{}", paths::SECURITY_GROUPS, group, rule)
}

fn flatten_rule(rule: &SecurityGroupRule) -> Value {
    json!({
        "rule_id": rule.id,
        "direction": rule.direction,
        "ip_version": rule.ip_version,
        "protocol": rule.protocol,
        "remote": rule.remote.as_ref().map(RuleRemote::as_string),
        "port_min": rule.port_min,
        "port_max": rule.port_max,
        "type": rule.icmp_type,
        "code": rule.code,
    })
}

/// Security group scoped to a VPC
pub struct IsSecurityGroup {
    ctx: Context,
}

impl IsSecurityGroup {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsSecurityGroup {
    fn type_name(&self) -> &'static str {
        "ibm_is_security_group"
    }

    fn schema(&self) -> Schema {
        let rule = Schema::new()
            .attr("rule_id", Attribute::string().computed())
            .attr("direction", Attribute::string().computed())
            .attr("ip_version", Attribute::string().computed())
            .attr("protocol", Attribute::string().computed())
            .attr("remote", Attribute::string().computed())
            .attr("port_min", Attribute::int().computed())
            .attr("port_max", Attribute::int().computed())
            .attr("type", Attribute::int().computed())
            .attr("code", Attribute::int().computed());

        Schema::new()
            .attr(
                "name",
                Attribute::string()
                    .optional()
                    .computed()
                    .validate(Validator::ResourceName),
            )
            .attr("vpc", Attribute::string().required().force_new())
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("crn", crn_attr())
            .attr(
                "rules",
                Attribute::block(rule)
                    .computed()
                    .describe("Rules currently in the group, managed through ibm_is_security_group_rule"),
            )
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let mut body = Map::new();
        body.insert("vpc".into(), json!({ "id": d.require_str("vpc")? }));
        if let Some(name) = d.get_str("name") {
            body.insert("name".into(), json!(name));
        }
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let group: SecurityGroup = self
            .ctx
            .vpc()
            .create(paths::SECURITY_GROUPS, &Value::Object(body))
            .await?;
        tracing::info!("Created security group {} ({})", group.name, group.id);
        d.set_id(group.id.as_str());
        common::apply_tags(&self.ctx, d, &group.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = group_path(d.id());
        let Some(group) =
            common::read_or_clear::<SecurityGroup>(&self.ctx, d, &object_path).await?
        else {
            return Ok(());
        };
        d.set("name", group.name.as_str());
        d.set("vpc", group.vpc.id.as_str());
        d.set("resource_group", group.resource_group.id.as_str());
        d.set("crn", group.crn.as_str());
        d.set(
            "rules",
            group.rules.iter().map(flatten_rule).collect::<Vec<_>>(),
        );
        common::read_tags(&self.ctx, d, &group.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            if let Some(name) = d.get_str("name") {
                let _: SecurityGroup = self
                    .ctx
                    .vpc()
                    .update(&group_path(d.id()), &json!({ "name": name }))
                    .await?;
            }
        }
        if d.has_change("tags") {
            let crn = d.require_str("crn")?.to_string();
            common::apply_tags(&self.ctx, d, &crn).await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        common::delete_vpc_object(&self.ctx, &group_path(d.id())).await?;
        d.clear_id();
        Ok(())
    }
}

fn port_range() -> Schema {
    Schema::new()
        .attr(
            "port_min",
            Attribute::int()
                .optional()
                .default(1)
                .validate(Validator::IntBetween(1, 65535)),
        )
        .attr(
            "port_max",
            Attribute::int()
                .optional()
                .default(65535)
                .validate(Validator::IntBetween(1, 65535)),
        )
}

/// Build the rule body from the protocol block that is set
fn rule_from_config(d: &ResourceData) -> Result<SecurityGroupRule> {
    let mut rule = SecurityGroupRule {
        direction: d.require_str("direction")?.to_string(),
        ip_version: d.get_str("ip_version").unwrap_or("ipv4").to_string(),
        protocol: "all".to_string(),
        remote: d.get_str("remote").map(RuleRemote::parse),
        ..Default::default()
    };

    if let Some(icmp) = d.get_block("icmp") {
        rule.protocol = "icmp".into();
        rule.icmp_type = icmp.get("type").and_then(Value::as_i64);
        rule.code = icmp.get("code").and_then(Value::as_i64);
    } else {
        for protocol in ["tcp", "udp"] {
            if let Some(ports) = d.get_block(protocol) {
                rule.protocol = protocol.into();
                rule.port_min = Some(ports.get("port_min").and_then(Value::as_i64).unwrap_or(1));
                rule.port_max = Some(ports.get("port_max").and_then(Value::as_i64).unwrap_or(65535));
            }
        }
    }
    Ok(rule)
}

/// Single rule inside a security group, addressed as `groupID.ruleID`
pub struct IsSecurityGroupRule {
    ctx: Context,
}

impl IsSecurityGroupRule {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsSecurityGroupRule {
    fn type_name(&self) -> &'static str {
        "ibm_is_security_group_rule"
    }

    fn schema(&self) -> Schema {
        let icmp = Schema::new()
            .attr(
                "type",
                Attribute::int().optional().validate(Validator::IntBetween(0, 254)),
            )
            .attr(
                "code",
                Attribute::int().optional().validate(Validator::IntBetween(0, 255)),
            );

        Schema::new()
            .attr("group", Attribute::string().required().force_new())
            .attr(
                "direction",
                Attribute::string()
                    .required()
                    .validate(Validator::OneOf(&["inbound", "outbound"])),
            )
            .attr(
                "ip_version",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("ipv4")
                    .validate(Validator::OneOf(&["ipv4"])),
            )
            .attr(
                "remote",
                Attribute::string()
                    .optional()
                    .computed()
                    .describe("IP address, CIDR block or security group id"),
            )
            .attr(
                "icmp",
                Attribute::block(icmp)
                    .optional()
                    .force_new()
                    .max_items(1)
                    .conflicts_with(&["tcp", "udp"]),
            )
            .attr(
                "tcp",
                Attribute::block(port_range())
                    .optional()
                    .force_new()
                    .max_items(1)
                    .conflicts_with(&["icmp", "udp"]),
            )
            .attr(
                "udp",
                Attribute::block(port_range())
                    .optional()
                    .force_new()
                    .max_items(1)
                    .conflicts_with(&["icmp", "tcp"]),
            )
            .attr("rule_id", Attribute::string().computed())
            .attr("protocol", Attribute::string().computed())
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let group = d.require_str("group")?.to_string();
        let body = rule_from_config(d)?;
        let rule: SecurityGroupRule = self
            .ctx
            .vpc()
            .create(&format!("{}/rules", group_path(&group)), &body)
            .await?;
        tracing::info!("Created {} {} rule {} in {}", rule.direction, rule.protocol, rule.id, group);
        d.set_id(id::compose(&[&group, &rule.id], id::SG_RULE));
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let [group, rule_id] = id::parse::<2>(d.id(), id::SG_RULE)?;
        let (group, rule_id) = (group.to_string(), rule_id.to_string());
        let Some(rule) =
            common::read_or_clear::<SecurityGroupRule>(&self.ctx, d, &rule_path(&group, &rule_id))
                .await?
        else {
            return Ok(());
        };

        d.set("group", group.as_str());
        d.set("rule_id", rule.id.as_str());
        d.set("direction", rule.direction.as_str());
        d.set("ip_version", rule.ip_version.as_str());
        d.set("protocol", rule.protocol.as_str());
        d.set("remote", rule.remote.as_ref().map(RuleRemote::as_string));
        match rule.protocol.as_str() {
            "icmp" => d.set("icmp", json!([{"type": rule.icmp_type, "code": rule.code}])),
            "tcp" | "udp" => d.set(
                &rule.protocol,
                json!([{"port_min": rule.port_min, "port_max": rule.port_max}]),
            ),
            _ => {}
        }
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let [group, rule_id] = id::parse::<2>(d.id(), id::SG_RULE)?;
        let mut patch = Map::new();
        if d.has_change("direction") {
            patch.insert("direction".into(), json!(d.require_str("direction")?));
        }
        if d.has_change("remote") {
            if let Some(remote) = d.get_str("remote") {
                patch.insert("remote".into(), json!(RuleRemote::parse(remote)));
            }
        }
        if !patch.is_empty() {
            let _: SecurityGroupRule = self
                .ctx
                .vpc()
                .update(&rule_path(group, rule_id), &Value::Object(patch))
                .await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let [group, rule_id] = id::parse::<2>(d.id(), id::SG_RULE)?;
        common::delete_vpc_object(&self.ctx, &rule_path(group, rule_id)).await?;
        d.clear_id();
        Ok(())
    }
}
