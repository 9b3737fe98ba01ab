//! `ibm_cis_edge_functions_action` resource

use super::{cis_id_attr, domain_id_attr, found, ignore_gone, parse_id, set_location, zone_id};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_provider::{Attribute, Resource, ResourceData, Result, Schema, Timeouts, id};

/// Edge function script deployed to a CIS zone
pub struct CisEdgeFunctionsAction {
    ctx: Context,
}

impl CisEdgeFunctionsAction {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for CisEdgeFunctionsAction {
    fn type_name(&self) -> &'static str {
        "ibm_cis_edge_functions_action"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("cis_id", cis_id_attr())
            .attr("domain_id", domain_id_attr())
            .attr("action_name", Attribute::string().required().force_new())
            .attr(
                "script",
                Attribute::string()
                    .required()
                    .describe("JavaScript source of the edge function"),
            )
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let crn = d.require_str("cis_id")?.to_string();
        let zone = zone_id(d.require_str("domain_id")?).to_string();
        let name = d.require_str("action_name")?.to_string();

        self.ctx
            .cis()
            .put_edge_function_script(&crn, &zone, &name, d.require_str("script")?)
            .await?;
        tracing::info!("Uploaded edge function {}", name);
        d.set_id(id::compose(&[&name, &zone, &crn], id::CIS));
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let (name, zone, crn) = parse_id(d)?;
        let result = self.ctx.cis().get_edge_function_script(&crn, &zone, &name).await;
        let Some(script) = found(d, result)? else {
            return Ok(());
        };
        set_location(d, &zone, &crn);
        d.set("action_name", name);
        d.set("script", script);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("script") {
            let (name, zone, crn) = parse_id(d)?;
            self.ctx
                .cis()
                .put_edge_function_script(&crn, &zone, &name, d.require_str("script")?)
                .await?;
            tracing::info!("Updated edge function {}", name);
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let (name, zone, crn) = parse_id(d)?;
        ignore_gone(
            self.ctx
                .cis()
                .delete_edge_function_script(&crn, &zone, &name)
                .await,
        )?;
        d.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cis::testing::{CRN, envelope, zone_path};
    use crate::common::testing::{context, obj};
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SCRIPT: &str = "addEventListener('fetch', e => e.respondWith(fetch(e.request)))";

    #[tokio::test]
    async fn test_upload_and_read_script() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(zone_path("/workers/script/redirect").as_str()))
            .and(header("Content-Type", "application/javascript"))
            .and(body_string(SCRIPT))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(envelope(json!({"id": "redirect"}))),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(zone_path("/workers/script/redirect").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCRIPT))
            .mount(&server)
            .await;

        let res = CisEdgeFunctionsAction::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "cis_id": CRN,
            "domain_id": "zone-1",
            "action_name": "redirect",
            "script": SCRIPT
        })));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.id(), format!("redirect:zone-1:{}", CRN));
        assert_eq!(d.get_str("script"), Some(SCRIPT));
    }

    #[tokio::test]
    async fn test_unchanged_script_is_not_uploaded() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(zone_path("/workers/script/redirect").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(SCRIPT))
            .mount(&server)
            .await;

        let state = obj(json!({
            "cis_id": CRN,
            "domain_id": "zone-1",
            "action_name": "redirect",
            "script": SCRIPT
        }));
        let mut d = ResourceData::for_update(format!("redirect:zone-1:{}", CRN), state.clone(), state);
        CisEdgeFunctionsAction::new(context(&server))
            .update(&mut d)
            .await
            .unwrap();
    }
}
