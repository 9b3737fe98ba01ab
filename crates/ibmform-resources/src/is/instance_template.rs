//! `ibm_is_instance_template` resource

use super::instance::{expand_interface, interface_schema};
use crate::common::{self, crn_attr, resource_group_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{
    IdRef, InstancePrototype, InstanceTemplate, NameRef, NetworkInterfaceTemplate, paths,
};
use ibmform_provider::{
    Attribute, ProviderError, Resource, ResourceData, Result, Schema, Timeouts, Validator,
};
use serde_json::{Value, json};

fn path(id: &str) -> String {
    format!("{}/{}", paths::INSTANCE_TEMPLATES, id)
}

fn flatten_interface(nic: &NetworkInterfaceTemplate) -> Value {
    let mut groups: Vec<String> = nic.security_groups.iter().map(|g| g.id.clone()).collect();
    groups.sort();
    json!({
        "name": nic.name,
        "subnet": nic.subnet.id,
        "primary_ipv4_address": nic.primary_ipv4_address.clone().unwrap_or_default(),
        "security_groups": groups,
    })
}

fn set_template(d: &mut ResourceData, template: &InstanceTemplate) {
    d.set("name", template.name.as_str());
    d.set("profile", template.profile.name.as_str());
    d.set("vpc", template.vpc.id.as_str());
    d.set("zone", template.zone.name.as_str());
    if let Some(image) = &template.image {
        d.set("image", image.id.as_str());
    }
    d.set(
        "keys",
        template.keys.iter().map(|k| k.id.clone()).collect::<Vec<_>>(),
    );
    if let Some(primary) = &template.primary_network_interface {
        d.set("primary_network_interface", json!([flatten_interface(primary)]));
    }
    d.set(
        "network_interfaces",
        template
            .network_interfaces
            .iter()
            .map(flatten_interface)
            .collect::<Vec<_>>(),
    );
    d.set("user_data", template.user_data.clone());
    d.set("resource_group", template.resource_group.id.as_str());
    d.set("crn", template.crn.as_str());
}

/// Instance configuration saved for later provisioning
///
/// Everything but the name is fixed once the template exists.
pub struct IsInstanceTemplate {
    ctx: Context,
}

impl IsInstanceTemplate {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsInstanceTemplate {
    fn type_name(&self) -> &'static str {
        "ibm_is_instance_template"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr("vpc", Attribute::string().required().force_new())
            .attr("zone", Attribute::string().required().force_new())
            .attr("image", Attribute::string().required().force_new())
            .attr("profile", Attribute::string().required().force_new())
            .attr("keys", Attribute::string_set().required().force_new())
            .attr(
                "primary_network_interface",
                Attribute::block(interface_schema())
                    .required()
                    .force_new()
                    .max_items(1),
            )
            .attr(
                "network_interfaces",
                Attribute::block(interface_schema()).optional().computed().force_new(),
            )
            .attr("user_data", Attribute::string().optional().force_new())
            .attr("resource_group", resource_group_attr())
            .attr("crn", crn_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let primary = d.get_block("primary_network_interface").ok_or_else(|| {
            ProviderError::Attribute {
                key: "primary_network_interface".into(),
                expected: "block",
            }
        })?;
        let primary = expand_interface(primary)?;
        let network_interfaces = d
            .get_blocks("network_interfaces")
            .into_iter()
            .map(expand_interface)
            .collect::<Result<Vec<_>>>()?;

        let body = InstancePrototype {
            name: d.require_str("name")?.to_string(),
            profile: NameRef::new(d.require_str("profile")?),
            vpc: IdRef::new(d.require_str("vpc")?),
            zone: NameRef::new(d.require_str("zone")?),
            image: IdRef::new(d.require_str("image")?),
            keys: d.get_string_list("keys").into_iter().map(IdRef::new).collect(),
            primary_network_interface: primary,
            network_interfaces,
            volume_attachments: Vec::new(),
            user_data: d.get_str("user_data").map(str::to_string),
            placement_target: None,
            resource_group: common::resource_group(&self.ctx, d),
        };

        let template: InstanceTemplate = self
            .ctx
            .vpc()
            .create(paths::INSTANCE_TEMPLATES, &body)
            .await?;
        tracing::info!("Created instance template {} ({})", template.name, template.id);
        d.set_id(template.id.as_str());
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(template) = common::read_or_clear::<InstanceTemplate>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        set_template(d, &template);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            let _: InstanceTemplate = self
                .ctx
                .vpc()
                .update(&path(d.id()), &json!({"name": d.require_str("name")?}))
                .await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        common::delete_vpc_object(&self.ctx, &path(d.id())).await?;
        d.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::testing::{context, obj};
    use wiremock::matchers::{body_json, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn template_body(name: &str) -> Value {
        json!({
            "id": "tmpl-1",
            "crn": "crn:v1:tmpl-1",
            "name": name,
            "profile": {"name": "bx2-2x8"},
            "vpc": {"id": "vpc-1"},
            "zone": {"name": "us-south-1"},
            "image": {"id": "img-1"},
            "keys": [{"id": "key-2"}, {"id": "key-1"}],
            "primary_network_interface": {
                "name": "eth0",
                "subnet": {"id": "s-1"},
                "security_groups": [{"id": "sg-1"}]
            },
            "resource_group": {"id": "rg-default"},
            "created_at": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_create_posts_prototype() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/v1/instance/templates"))
            .and(body_json(json!({
                "name": "web-template",
                "profile": {"name": "bx2-2x8"},
                "vpc": {"id": "vpc-1"},
                "zone": {"name": "us-south-1"},
                "image": {"id": "img-1"},
                "keys": [{"id": "key-1"}, {"id": "key-2"}],
                "primary_network_interface": {
                    "name": "eth0",
                    "subnet": {"id": "s-1"},
                    "security_groups": [{"id": "sg-1"}]
                },
                "resource_group": {"id": "rg-default"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(template_body("web-template")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/instance/templates/tmpl-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(template_body("web-template")))
            .mount(&server)
            .await;

        let res = IsInstanceTemplate::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "name": "web-template",
            "vpc": "vpc-1",
            "zone": "us-south-1",
            "image": "img-1",
            "profile": "bx2-2x8",
            "keys": ["key-1", "key-2"],
            "primary_network_interface": [{
                "name": "eth0",
                "subnet": "s-1",
                "security_groups": ["sg-1"]
            }]
        })));
        res.create(&mut d).await.unwrap();
        assert_eq!(d.id(), "tmpl-1");
        assert_eq!(d.get_str("crn"), Some("crn:v1:tmpl-1"));
        let primary = d.get_block("primary_network_interface").unwrap();
        assert_eq!(primary["subnet"], "s-1");
        assert_eq!(primary["security_groups"], json!(["sg-1"]));
    }

    #[tokio::test]
    async fn test_rename_patches_name_only() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(url_path("/v1/instance/templates/tmpl-1"))
            .and(body_json(json!({"name": "web-v2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(template_body("web-v2")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/instance/templates/tmpl-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(template_body("web-v2")))
            .mount(&server)
            .await;

        let prior = obj(json!({"name": "web-template", "profile": "bx2-2x8"}));
        let planned = obj(json!({"name": "web-v2", "profile": "bx2-2x8"}));
        let mut d = ResourceData::for_update("tmpl-1", prior, planned);
        IsInstanceTemplate::new(context(&server)).update(&mut d).await.unwrap();
        assert_eq!(d.get_str("name"), Some("web-v2"));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_template() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(url_path("/v1/instance/templates/tmpl-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let mut d = ResourceData::from_state("tmpl-1", serde_json::Map::new());
        IsInstanceTemplate::new(context(&server)).delete(&mut d).await.unwrap();
        assert_eq!(d.id(), "");
    }
}
