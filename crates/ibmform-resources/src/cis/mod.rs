//! Cloud Internet Services (`ibm_cis_*`) resources
//!
//! Every CIS object lives in a zone of a CIS instance, so ids are
//! `objectID:zoneID:crn` composites.

pub mod dns_record;
pub mod edge_functions_action;
pub mod edge_functions_trigger;
pub mod rate_limit;

pub use dns_record::CisDnsRecord;
pub use edge_functions_action::CisEdgeFunctionsAction;
pub use edge_functions_trigger::CisEdgeFunctionsTrigger;
pub use rate_limit::CisRateLimit;

use ibmform_client::ClientError;
use ibmform_provider::{Attribute, ResourceData, Result, id};

/// Split a CIS id into `(object, zone, crn)`
pub(crate) fn parse_id(d: &ResourceData) -> Result<(String, String, String)> {
    let [object, zone, crn] = id::parse::<3>(d.id(), id::CIS)?;
    Ok((object.to_string(), zone.to_string(), crn.to_string()))
}

/// Zone id from either a bare id or a `zoneID:crn` composite
pub(crate) fn zone_id(raw: &str) -> &str {
    raw.split(id::CIS).next().unwrap_or(raw)
}

pub(crate) fn cis_id_attr() -> Attribute {
    Attribute::string()
        .required()
        .force_new()
        .describe("CIS instance CRN")
}

pub(crate) fn domain_id_attr() -> Attribute {
    Attribute::string()
        .required()
        .force_new()
        .describe("Zone (domain) id")
}

/// Write `cis_id`/`domain_id` back, keeping a configured composite domain id
pub(crate) fn set_location(d: &mut ResourceData, zone: &str, crn: &str) {
    d.set("cis_id", crn);
    if d.get_str("domain_id").map(zone_id) != Some(zone) {
        d.set("domain_id", zone);
    }
}

/// Unwrap a CIS lookup for `read`, clearing the id when the object is gone
pub(crate) fn found<T>(d: &mut ResourceData, result: ibmform_client::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => {
            tracing::warn!("CIS object {} not found, removing from state", d.id());
            d.clear_id();
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Treat a 404 on delete as already deleted
pub(crate) fn ignore_gone(result: std::result::Result<(), ClientError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_zone_id_accepts_composite() {
        assert_eq!(zone_id("zone-1"), "zone-1");
        assert_eq!(zone_id("zone-1:crn:v1:abc"), "zone-1");
    }

    #[test]
    fn test_parse_id_keeps_crn() {
        let d = ResourceData::from_state(format!("rec-1:zone-1:{}", testing::CRN), Map::new());
        let (record, zone, crn) = parse_id(&d).unwrap();
        assert_eq!(record, "rec-1");
        assert_eq!(zone, "zone-1");
        assert_eq!(crn, testing::CRN);
    }

    #[test]
    fn test_set_location_keeps_composite_domain() {
        let mut cfg = Map::new();
        cfg.insert("domain_id".into(), json!("zone-1:crn:v1:abc"));
        let mut d = ResourceData::new(cfg);
        set_location(&mut d, "zone-1", "crn:v1:abc");
        assert_eq!(d.get_str("domain_id"), Some("zone-1:crn:v1:abc"));

        set_location(&mut d, "zone-2", "crn:v1:abc");
        assert_eq!(d.get_str("domain_id"), Some("zone-2"));
    }
}
