//! `ibm_is_ssh_key` resource

use crate::common::{self, crn_attr, resource_group_attr, tags_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{Key, paths};
use ibmform_provider::{Attribute, Resource, ResourceData, Result, Schema, Validator};
use serde_json::{Map, Value, json};

fn path(id: &str) -> String {
    format!("{}/{}", paths::KEYS, id)
}

/// Public SSH key injected into instances at provisioning time
pub struct IsSshKey {
    ctx: Context,
}

impl IsSshKey {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for IsSshKey {
    fn type_name(&self) -> &'static str {
        "ibm_is_ssh_key"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr(
                "name",
                Attribute::string().required().validate(Validator::ResourceName),
            )
            .attr(
                "public_key",
                Attribute::string()
                    .required()
                    .force_new()
                    .describe("OpenSSH formatted public key"),
            )
            .attr(
                "type",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("rsa")
                    .validate(Validator::OneOf(&["rsa", "ed25519"])),
            )
            .attr("resource_group", resource_group_attr())
            .attr("tags", tags_attr())
            .attr("fingerprint", Attribute::string().computed())
            .attr("length", Attribute::int().computed())
            .attr("crn", crn_attr())
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let mut body = Map::new();
        body.insert("name".into(), json!(d.require_str("name")?));
        body.insert("public_key".into(), json!(d.require_str("public_key")?.trim()));
        body.insert("type".into(), json!(d.get_str("type").unwrap_or("rsa")));
        if let Some(rg) = common::resource_group(&self.ctx, d) {
            body.insert("resource_group".into(), json!(rg));
        }

        let key: Key = self.ctx.vpc().create(paths::KEYS, &Value::Object(body)).await?;
        tracing::info!("Created SSH key {} ({})", key.name, key.id);
        d.set_id(key.id.as_str());
        common::apply_tags(&self.ctx, d, &key.crn).await?;
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let object_path = path(d.id());
        let Some(key) = common::read_or_clear::<Key>(&self.ctx, d, &object_path).await? else {
            return Ok(());
        };
        d.set("name", key.name.as_str());
        // keep the configured formatting when the key material is unchanged
        let configured = d.get_str("public_key").map(str::trim);
        if configured != Some(key.public_key.trim()) {
            d.set("public_key", key.public_key.as_str());
        }
        d.set("type", key.key_type.as_str());
        d.set("fingerprint", key.fingerprint.as_str());
        d.set("length", key.length);
        d.set("resource_group", key.resource_group.id.as_str());
        d.set("crn", key.crn.as_str());
        common::read_tags(&self.ctx, d, &key.crn).await;
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            let _: Key = self
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
        common::delete_vpc_object(&self.ctx, &path(d.id())).await?;
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

    #[tokio::test]
    async fn test_create_and_read() {
        let server = MockServer::start().await;
        mount_tags(&server).await;
        let body = json!({
            "id": "k-1",
            "crn": "crn:v1:key:k-1",
            "name": "deploy",
            "public_key": "ssh-ed25519 AAAAC3Nza",
            "type": "ed25519",
            "length": 256,
            "fingerprint": "SHA256:abc"
        });
        Mock::given(method("POST"))
            .and(url_path("/v1/keys"))
            .and(body_json(json!({
                "name": "deploy",
                "public_key": "ssh-ed25519 AAAAC3Nza",
                "type": "ed25519",
                "resource_group": {"id": "rg-default"}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/v1/keys/k-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let key = IsSshKey::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "name": "deploy",
            "public_key": "ssh-ed25519 AAAAC3Nza\n",
            "type": "ed25519"
        })));
        key.create(&mut d).await.unwrap();
        assert_eq!(d.id(), "k-1");
        assert_eq!(d.get_str("fingerprint"), Some("SHA256:abc"));
        assert_eq!(d.get_str("public_key"), Some("ssh-ed25519 AAAAC3Nza\n"));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_key() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(url_path("/v1/keys/k-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let key = IsSshKey::new(context(&server));
        let mut d = ResourceData::from_state("k-1", obj(json!({})));
        key.delete(&mut d).await.unwrap();
        assert!(d.id().is_empty());
    }
}
