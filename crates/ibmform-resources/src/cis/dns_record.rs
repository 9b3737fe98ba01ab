//! `ibm_cis_dns_record` resource

use super::{cis_id_attr, domain_id_attr, found, ignore_gone, parse_id, set_location, zone_id};
use crate::context::Context;
use async_trait::async_trait;
use ibmform_client::cis::{DnsRecord, DnsRecordRequest};
use ibmform_provider::{
    Attribute, ProviderError, Resource, ResourceData, Result, Schema, Timeouts, Validator, id,
};
use serde_json::{Map, Value};

const RECORD_TYPES: &[&str] = &[
    "A", "AAAA", "CAA", "CNAME", "LOC", "MX", "NS", "SPF", "SRV", "TXT",
];

const LOC_NUMBERS: &[&str] = &[
    "altitude",
    "lat_degrees",
    "lat_minutes",
    "lat_seconds",
    "long_degrees",
    "long_minutes",
    "long_seconds",
    "precision_horz",
    "precision_vert",
    "size",
];
const LOC_STRINGS: &[&str] = &["lat_direction", "long_direction"];
const CAA_STRINGS: &[&str] = &["tag", "value"];
const SRV_NUMBERS: &[&str] = &["port", "priority", "weight"];
const SRV_STRINGS: &[&str] = &["name", "target", "proto", "service"];

/// Typed record `data` from the string map in configuration
fn record_data(record_type: &str, raw: Option<&Map<String, Value>>) -> Result<Option<Value>> {
    let (numbers, strings): (&[&str], &[&str]) = match record_type {
        "LOC" => (LOC_NUMBERS, LOC_STRINGS),
        "CAA" => (&[], CAA_STRINGS),
        "SRV" => (SRV_NUMBERS, SRV_STRINGS),
        _ => return Ok(None),
    };
    let raw = raw.ok_or_else(|| {
        ProviderError::InvalidConfig(format!("{} records require a data block", record_type))
    })?;

    let field = |key: &str| {
        raw.get(key).and_then(Value::as_str).ok_or_else(|| {
            ProviderError::InvalidConfig(format!(
                "{} record data is missing '{}'",
                record_type, key
            ))
        })
    };

    let mut data = Map::new();
    for key in strings {
        data.insert(key.to_string(), Value::from(field(key)?));
    }
    for key in numbers {
        let text = field(key)?;
        let number: i64 = text.parse().map_err(|_| {
            ProviderError::InvalidConfig(format!(
                "{} record data '{}' must be an integer, got '{}'",
                record_type, key, text
            ))
        })?;
        data.insert(key.to_string(), Value::from(number));
    }
    Ok(Some(Value::Object(data)))
}

/// Record data back into the string map shape used in configuration
fn flatten_data(data: &Value) -> Value {
    let Some(entries) = data.as_object() else {
        return Value::Null;
    };
    entries
        .iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), Value::String(text))
        })
        .collect::<Map<String, Value>>()
        .into()
}

/// Whether the API's fully qualified name is the configured short name
fn same_name(configured: &str, actual: &str, zone_name: Option<&str>) -> bool {
    if configured.eq_ignore_ascii_case(actual) {
        return true;
    }
    match zone_name {
        Some(zone) if configured == "@" => actual.eq_ignore_ascii_case(zone),
        Some(zone) => actual.eq_ignore_ascii_case(&format!("{}.{}", configured, zone)),
        None => false,
    }
}

fn request(d: &ResourceData) -> Result<DnsRecordRequest> {
    let record_type = d.require_str("type")?.to_string();
    let name = d.get_str("name").map(str::to_string);
    let content = d.get_str("content").map(str::to_string);
    let priority = d.get_i64("priority");

    match record_type.as_str() {
        "SRV" => {}
        _ if name.is_none() => {
            return Err(ProviderError::InvalidConfig(format!(
                "{} records require a name",
                record_type
            )));
        }
        "A" | "AAAA" | "CNAME" | "NS" | "SPF" | "TXT" | "MX" if content.is_none() => {
            return Err(ProviderError::InvalidConfig(format!(
                "{} records require content",
                record_type
            )));
        }
        "MX" if priority.is_none() => {
            return Err(ProviderError::InvalidConfig(
                "MX records require a priority".into(),
            ));
        }
        _ => {}
    }

    let data = record_data(&record_type, d.get("data").and_then(Value::as_object))?;
    let content = match record_type.as_str() {
        "LOC" | "CAA" | "SRV" => None,
        _ => content,
    };
    Ok(DnsRecordRequest {
        name: name.unwrap_or_default(),
        content,
        ttl: d.get_i64("ttl").unwrap_or(1),
        proxied: d.get_bool("proxied"),
        priority: if record_type == "MX" { priority } else { None },
        data,
        record_type,
    })
}

/// DNS record in a CIS zone
pub struct CisDnsRecord {
    ctx: Context,
}

impl CisDnsRecord {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    fn set_record(d: &mut ResourceData, record: DnsRecord) {
        let keep = d
            .get_str("name")
            .is_some_and(|n| same_name(n, &record.name, record.zone_name.as_deref()));
        if !keep {
            d.set("name", record.name.as_str());
        }
        d.set("record_id", record.id.as_str());
        d.set("type", record.record_type.as_str());
        if !record.content.is_empty() {
            d.set("content", record.content.as_str());
        }
        d.set("ttl", record.ttl);
        d.set("proxied", record.proxied);
        d.set("proxiable", record.proxiable);
        if record.record_type == "MX" {
            d.set("priority", record.priority);
        }
        if let Some(data) = &record.data {
            d.set("data", flatten_data(data));
        }
        d.set("zone_name", record.zone_name);
        d.set("created_on", record.created_on);
        d.set("modified_on", record.modified_on);
    }
}

#[async_trait]
impl Resource for CisDnsRecord {
    fn type_name(&self) -> &'static str {
        "ibm_cis_dns_record"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("cis_id", cis_id_attr())
            .attr("domain_id", domain_id_attr())
            .attr(
                "name",
                Attribute::string()
                    .optional()
                    .describe("Record name, short or fully qualified; required except for SRV"),
            )
            .attr(
                "type",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(Validator::OneOf(RECORD_TYPES)),
            )
            .attr("content", Attribute::string().optional())
            .attr(
                "data",
                Attribute::map()
                    .optional()
                    .describe("LOC, CAA and SRV record fields"),
            )
            .attr("priority", Attribute::int().optional().describe("MX priority"))
            .attr(
                "ttl",
                Attribute::int()
                    .optional()
                    .default(1)
                    .describe("1 means automatic"),
            )
            .attr("proxied", Attribute::bool().optional().default(false))
            .attr("proxiable", Attribute::bool().computed())
            .attr("record_id", Attribute::string().computed())
            .attr("zone_name", Attribute::string().computed())
            .attr("created_on", Attribute::string().computed())
            .attr("modified_on", Attribute::string().computed())
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::minutes(10, 10, 10)
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()> {
        let crn = d.require_str("cis_id")?.to_string();
        let zone = zone_id(d.require_str("domain_id")?).to_string();
        let body = request(d)?;

        let record = self.ctx.cis().create_dns_record(&crn, &zone, &body).await?;
        tracing::info!("Created {} record {} ({})", record.record_type, record.name, record.id);
        d.set_id(id::compose(&[&record.id, &zone, &crn], id::CIS));
        self.read(d).await
    }

    async fn read(&self, d: &mut ResourceData) -> Result<()> {
        let (record_id, zone, crn) = parse_id(d)?;
        let result = self.ctx.cis().get_dns_record(&crn, &zone, &record_id).await;
        let Some(record) = found(d, result)? else {
            return Ok(());
        };
        set_location(d, &zone, &crn);
        Self::set_record(d, record);
        Ok(())
    }

    async fn update(&self, d: &mut ResourceData) -> Result<()> {
        if d.has_changes(&["name", "content", "data", "priority", "ttl", "proxied"]) {
            let (record_id, zone, crn) = parse_id(d)?;
            let body = request(d)?;
            self.ctx
                .cis()
                .update_dns_record(&crn, &zone, &record_id, &body)
                .await?;
        }
        self.read(d).await
    }

    async fn delete(&self, d: &mut ResourceData) -> Result<()> {
        let (record_id, zone, crn) = parse_id(d)?;
        ignore_gone(self.ctx.cis().delete_dns_record(&crn, &zone, &record_id).await)?;
        d.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cis::testing::{CRN, envelope, zone_path};
    use crate::common::testing::{context, obj, offline_context};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record_body(name: &str) -> Value {
        envelope(json!({
            "id": "rec-1",
            "name": name,
            "type": "A",
            "content": "192.0.2.10",
            "ttl": 1,
            "proxied": true,
            "proxiable": true,
            "zone_id": "zone-1",
            "zone_name": "example.com",
            "created_on": "2024-03-01T10:00:00Z",
            "modified_on": "2024-03-01T10:00:00Z"
        }))
    }

    #[test]
    fn test_same_name() {
        assert!(same_name("www", "www.example.com", Some("example.com")));
        assert!(same_name("www.example.com", "www.example.com", Some("example.com")));
        assert!(same_name("@", "example.com", Some("example.com")));
        assert!(!same_name("api", "www.example.com", Some("example.com")));
        assert!(!same_name("www", "www.example.com", None));
    }

    #[test]
    fn test_srv_data_is_typed() {
        let raw = obj(json!({
            "name": "_sip",
            "target": "sip.example.com",
            "proto": "_tcp",
            "service": "_sip",
            "port": "5060",
            "priority": "10",
            "weight": "5"
        }));
        let data = record_data("SRV", Some(&raw)).unwrap().unwrap();
        assert_eq!(data["port"], 5060);
        assert_eq!(data["target"], "sip.example.com");
        assert!(record_data("A", None).unwrap().is_none());
    }

    #[test]
    fn test_loc_requires_numeric_fields() {
        let raw = obj(json!({"lat_direction": "N", "long_direction": "E", "altitude": "high"}));
        let err = record_data("LOC", Some(&raw)).unwrap_err();
        assert!(err.to_string().contains("altitude"));
    }

    #[tokio::test]
    async fn test_mx_requires_priority() {
        let res = CisDnsRecord::new(offline_context());
        let mut d = ResourceData::new(obj(json!({
            "cis_id": CRN,
            "domain_id": "zone-1",
            "name": "example.com",
            "type": "MX",
            "content": "mail.example.com"
        })));
        let err = res.create(&mut d).await.unwrap_err();
        assert!(err.to_string().contains("priority"));
    }

    #[tokio::test]
    async fn test_create_keeps_short_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(zone_path("/dns_records").as_str()))
            .and(body_json(json!({
                "type": "A",
                "name": "www",
                "content": "192.0.2.10",
                "ttl": 1,
                "proxied": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(record_body("www.example.com")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(zone_path("/dns_records/rec-1").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(record_body("www.example.com")))
            .mount(&server)
            .await;

        let res = CisDnsRecord::new(context(&server));
        let mut d = ResourceData::new(obj(json!({
            "cis_id": CRN,
            "domain_id": "zone-1",
            "name": "www",
            "type": "A",
            "content": "192.0.2.10",
            "proxied": true
        })));
        res.create(&mut d).await.unwrap();

        assert_eq!(d.id(), format!("rec-1:zone-1:{}", CRN));
        assert_eq!(d.get_str("name"), Some("www"));
        assert_eq!(d.get_str("zone_name"), Some("example.com"));
        assert_eq!(d.get_bool("proxiable"), Some(true));
    }

    #[tokio::test]
    async fn test_import_fills_location_from_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(zone_path("/dns_records/rec-1").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(record_body("www.example.com")))
            .mount(&server)
            .await;

        let res = CisDnsRecord::new(context(&server));
        let mut d = res.import(&format!("rec-1:zone-1:{}", CRN)).await.unwrap();
        res.read(&mut d).await.unwrap();
        assert_eq!(d.get_str("cis_id"), Some(CRN));
        assert_eq!(d.get_str("domain_id"), Some("zone-1"));
        assert_eq!(d.get_str("name"), Some("www.example.com"));
    }

    #[tokio::test]
    async fn test_deleted_record_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(zone_path("/dns_records/rec-1").as_str()))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false,
                "errors": [{"code": 81044, "message": "Record does not exist"}],
                "result": null
            })))
            .mount(&server)
            .await;

        let res = CisDnsRecord::new(context(&server));
        let mut d = ResourceData::from_state(format!("rec-1:zone-1:{}", CRN), Map::new());
        res.delete(&mut d).await.unwrap();
        assert_eq!(d.id(), "");
    }
}
