//! `ibm_cis_edge_functions_trigger` resource

use super::{cis_id_attr, domain_id_attr, found, ignore_gone, parse_id, set_location, zone_id};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::cis::EdgeFunctionTrigger;
use ibmform_provider::{Attribute, Resource, ResourceData, Result, Schema, Timeouts, id};

fn trigger(d: &ResourceData) -> Result<EdgeFunctionTrigger> {
    Ok(EdgeFunctionTrigger {
        id: String::new(),
        pattern: d.require_str("pattern_url")?.to_string(),
        script: d.get_str("action_name").map(str::to_string),
    })
}

/// Route binding a URL pattern to an edge function
pub struct CisEdgeFunctionsTrigger {
    ctx: Context,
}

impl CisEdgeFunctionsTrigger {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for CisEdgeFunctionsTrigger {
    fn type_name(&self) -> &'static str {
        "ibm_cis_edge_functions_trigger"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("cis_id", cis_id_attr())
            .attr("domain_id", domain_id_attr())
            .attr(
                "pattern_url",
                Attribute::string()
                    .required()
                    .describe("Route pattern, e.g. example.com/api/*"),
            )
            .attr(
                "action_name",
                Attribute::string()
                    .optional()
                    .describe("Edge function to run; unset disables the route"),
            )
            .attr("trigger_id", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let crn = d.require_str("cis_id")?.to_string();
        let zone = zone_id(d.require_str("domain_id")?).to_string();
        let body = trigger(d)?;

        let trigger_id = self
            .ctx
            .cis()
            .create_edge_function_trigger(&crn, &zone, &body)
            .await?;
        tracing::info!("Created edge function trigger {} for {}", trigger_id, body.pattern);
        d.set_id(id::compose(&[&trigger_id, &zone, &crn], id::CIS));
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let (trigger_id, zone, crn) = parse_id(d)?;
        let result = self
            .ctx
            .cis()
            .get_edge_function_trigger(&crn, &zone, &trigger_id)
            .await;
        let Some(trigger) = found(d, result)? else {
            return Ok(());
        };
        set_location(d, &zone, &crn);
        d.set("trigger_id", trigger_id);
        d.set("pattern_url", trigger.pattern);
        d.set("action_name", trigger.script);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_changes(&["pattern_url", "action_name"]) {
            let (trigger_id, zone, crn) = parse_id(d)?;
            self.ctx
                .cis()
                .update_edge_function_trigger(&crn, &zone, &trigger_id, &trigger(d)?)
                .await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let (trigger_id, zone, crn) = parse_id(d)?;
        ignore_gone(
            self.ctx
                .cis()
                .delete_edge_function_trigger(&crn, &zone, &trigger_id)
                .await,
        )?;
        d.clear_id();
        Ok(())
    }
}
