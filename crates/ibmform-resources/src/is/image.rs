//! `ibm_is_image` data source

use crate::common::{crn_attr, status_attr};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::vpc::{Image, paths};
use ibmform_provider::{
    Attribute, DataSource, ProviderError, ResourceData, Result, Schema, Validator,
};

/// Look up a stock or custom image by name
pub struct IsImageData {
    ctx: Context,
}

impl IsImageData {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DataSource for IsImageData {
    fn type_name(&self) -> &'static str {
        "ibm_is_image"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::string().required().describe("Image name"))
            .attr(
                "visibility",
                Attribute::string()
                    .optional()
                    .validate(Validator::OneOf(&["public", "private"])),
            )
            .attr("os", Attribute::string().computed())
            .attr("architecture", Attribute::string().computed())
            .attr("encryption", Attribute::string().computed())
            .attr("checksum", Attribute::string().computed())
            .attr("status", status_attr())
            .attr("crn", crn_attr())
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let name = d.require_str("name")?.to_string();
        let mut filters = vec![("name", name.as_str())];
        let visibility = d.get_str("visibility").map(str::to_string);
        if let Some(visibility) = &visibility {
            filters.push(("visibility", visibility.as_str()));
        }

        let image = self
            .ctx
            .vpc()
            .list_all::<Image>(paths::IMAGES, "images", &filters)
            .await?
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ProviderError::ResourceNotFound(format!("image '{}'", name)))?;

        d.set_id(image.id.as_str());
        d.set("visibility", image.visibility.as_str());
        d.set("status", image.status.as_str());
        d.set("crn", image.crn.as_str());
        d.set("encryption", image.encryption.clone());
        if let Some(os) = &image.operating_system {
            d.set("os", os.name.as_str());
            d.set("architecture", os.architecture.as_str());
        }
        let checksum = image
            .file
            .as_ref()
            .and_then(|f| f.pointer("/checksums/sha256"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        d.set("checksum", checksum);
        Ok(())
    }
}
