//! `ibm_cdn` resource

use crate::common::status_attr;
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::cdn::{CdnMapping, CdnMappingInput};
use ibmform_provider::{
    Attribute, ProviderError, Resource, ResourceData, Result, Schema, Timeouts, Validator,
};

/// Suffix the vendor appends to every CNAME
const CNAME_SUFFIX: &str = ".cdnedge.bluemix.net";

const ORIGIN_TYPES: &[&str] = &["HOST_SERVER", "OBJECT_STORAGE"];
const PROTOCOLS: &[&str] = &["HTTP", "HTTPS", "HTTP_AND_HTTPS"];
const CERTIFICATE_TYPES: &[&str] = &["SHARED_SAN_CERT", "WILDCARD_CERT"];

fn serves_http(protocol: &str) -> bool {
    protocol == "HTTP" || protocol == "HTTP_AND_HTTPS"
}

fn serves_https(protocol: &str) -> bool {
    protocol == "HTTPS" || protocol == "HTTP_AND_HTTPS"
}

/// Mapping input from configuration
///
/// Ports and certificate follow the protocol, bucket and file extensions
/// only apply to object storage origins.
fn mapping_input(d: &ResourceData) -> Result<CdnMappingInput> {
    let protocol = d.get_str("protocol").unwrap_or("HTTP").to_string();
    let origin_type = d.get_str("origin_type").unwrap_or("HOST_SERVER").to_string();
    let object_storage = origin_type == "OBJECT_STORAGE";

    let bucket_name = d.get_str("bucket_name").map(str::to_string);
    if object_storage && bucket_name.is_none() {
        return Err(ProviderError::InvalidConfig(
            "bucket_name is required for OBJECT_STORAGE origins".into(),
        ));
    }
    let certificate_type = d.get_str("certificate_type").map(str::to_string);
    if serves_https(&protocol) && certificate_type.is_none() {
        return Err(ProviderError::InvalidConfig(format!(
            "certificate_type is required for protocol {}",
            protocol
        )));
    }

    let cname = d.get_str("cname").map(|c| {
        if c.ends_with(CNAME_SUFFIX) {
            c.to_string()
        } else {
            format!("{}{}", c, CNAME_SUFFIX)
        }
    });
    let respect_headers = if d.get_bool("respect_headers").unwrap_or(true) { "1" } else { "0" };

    Ok(CdnMappingInput {
        unique_id: None,
        domain: d.require_str("host_name")?.to_string(),
        vendor_name: d.get_str("vendor_name").unwrap_or("akamai").to_string(),
        origin: d.require_str("origin_address")?.to_string(),
        bucket_name: bucket_name.filter(|_| object_storage),
        http_port: serves_http(&protocol).then(|| d.get_i64("http_port").unwrap_or(80)),
        https_port: serves_https(&protocol).then(|| d.get_i64("https_port").unwrap_or(443)),
        certificate_type: certificate_type.filter(|_| serves_https(&protocol)),
        cname,
        header: d.get_str("header").map(str::to_string),
        respect_headers: respect_headers.to_string(),
        file_extension: d
            .get_str("file_extension")
            .filter(|e| object_storage && !e.is_empty())
            .map(str::to_string),
        cache_key_query_rule: d
            .get_str("cache_key_query_rule")
            .unwrap_or("include-all")
            .to_string(),
        performance_configuration: d
            .get_str("performance_configuration")
            .unwrap_or("General web delivery")
            .to_string(),
        path: d.get_str("path").unwrap_or("/*").to_string(),
        origin_type,
        protocol,
    })
}

fn set_mapping(d: &mut ResourceData, mapping: &CdnMapping) {
    d.set("host_name", mapping.domain.as_str());
    d.set("vendor_name", mapping.vendor_name.as_str());
    d.set("origin_address", mapping.origin_host.as_str());
    d.set("origin_type", mapping.origin_type.as_str());
    d.set("protocol", mapping.protocol.as_str());
    if let Some(port) = mapping.http_port.filter(|p| *p > 0) {
        d.set("http_port", port);
    }
    if let Some(port) = mapping.https_port.filter(|p| *p > 0) {
        d.set("https_port", port);
    }
    if let Some(bucket) = &mapping.bucket_name {
        d.set("bucket_name", bucket.as_str());
    }
    if let Some(certificate) = &mapping.certificate_type {
        d.set("certificate_type", certificate.as_str());
    }
    if let Some(extensions) = &mapping.file_extension {
        d.set("file_extension", extensions.as_str());
    }
    let cname = mapping.cname.strip_suffix(CNAME_SUFFIX).unwrap_or(&mapping.cname);
    d.set("cname", cname);
    d.set("header", mapping.header.clone());
    d.set("respect_headers", mapping.respect_headers.unwrap_or(true));
    if let Some(rule) = &mapping.cache_key_query_rule {
        d.set("cache_key_query_rule", rule.as_str());
    }
    if let Some(performance) = &mapping.performance_configuration {
        d.set("performance_configuration", performance.as_str());
    }
    d.set("path", mapping.path.as_str());
    d.set("status", mapping.status.as_str());
}

/// CDN domain mapping in front of a host or object storage origin
pub struct Cdn {
    ctx: Context,
}

impl Cdn {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Resource for Cdn {
    fn type_name(&self) -> &'static str {
        "ibm_cdn"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("host_name", Attribute::string().required().force_new())
            .attr(
                "vendor_name",
                Attribute::string().optional().force_new().default("akamai"),
            )
            .attr(
                "origin_type",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("HOST_SERVER")
                    .validate(Validator::OneOf(ORIGIN_TYPES)),
            )
            .attr("origin_address", Attribute::string().required())
            .attr(
                "bucket_name",
                Attribute::string()
                    .optional()
                    .describe("Bucket, required for OBJECT_STORAGE origins"),
            )
            .attr(
                "protocol",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("HTTP")
                    .validate(Validator::OneOf(PROTOCOLS)),
            )
            .attr(
                "http_port",
                Attribute::int()
                    .optional()
                    .default(80)
                    .validate(Validator::IntBetween(1, 65535)),
            )
            .attr(
                "https_port",
                Attribute::int()
                    .optional()
                    .default(443)
                    .validate(Validator::IntBetween(1, 65535)),
            )
            .attr(
                "cname",
                Attribute::string()
                    .optional()
                    .computed()
                    .force_new()
                    .describe("CNAME without the .cdnedge.bluemix.net suffix"),
            )
            .attr("header", Attribute::string().optional().computed())
            .attr("respect_headers", Attribute::bool().optional().default(true))
            .attr(
                "file_extension",
                Attribute::string()
                    .optional()
                    .default("")
                    .describe("Comma separated extensions cached from object storage"),
            )
            .attr(
                "certificate_type",
                Attribute::string()
                    .optional()
                    .force_new()
                    .validate(Validator::OneOf(CERTIFICATE_TYPES)),
            )
            .attr(
                "cache_key_query_rule",
                Attribute::string()
                    .optional()
                    .default("include-all")
                    .describe("include-all, ignore-all, or include/ignore followed by query args"),
            )
            .attr(
                "performance_configuration",
                Attribute::string()
                    .optional()
                    .force_new()
                    .default("General web delivery"),
            )
            .attr("path", Attribute::string().optional().force_new().default("/*"))
            .attr("status", status_attr())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let input = mapping_input(d)?;
        let cdn = self.ctx.cdn();
        let mapping = cdn.create_mapping(&input).await?;
        tracing::info!("Created CDN mapping {} for {}", mapping.unique_id, input.domain);
        d.set_id(mapping.unique_id.as_str());

        let verified = cdn.verify_mapping(&mapping.unique_id).await?;
        tracing::info!("CDN mapping {} is {}", verified.unique_id, verified.status);
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        match self.ctx.cdn().get_mapping(d.id()).await {
            Ok(mapping) => {
                set_mapping(d, &mapping);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("CDN mapping {} not found, removing from state", d.id());
                d.clear_id();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        let changed = d.has_changes(&[
            "origin_address",
            "bucket_name",
            "http_port",
            "https_port",
            "header",
            "respect_headers",
            "file_extension",
            "cache_key_query_rule",
        ]);
        if changed {
            let mut input = mapping_input(d)?;
            input.unique_id = Some(d.id().to_string());
            self.ctx.cdn().update_mapping(&input).await?;
            tracing::info!("Updated CDN mapping {}", d.id());
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        match self.ctx.cdn().delete_mapping(d.id()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => tracing::debug!("CDN mapping {} already deleted", d.id()),
            Err(e) => return Err(e.into()),
        }
        d.clear_id();
        Ok(())
    }
}
