//! Composite resource IDs
//!
//! Child resources are addressed by joining their parent IDs with a
//! separator, e.g. `recordID:zoneID:crn` for CIS records, `lbID/poolID`
//! for load balancer pools and `sgID.ruleID` for security group rules.

use crate::error::{ProviderError, Result};

/// Separator for CIS resources (`id:zone:crn`)
pub const CIS: char = ':';
/// Separator for load balancer children (`lb/pool/member`)
pub const LB: char = '/';
/// Separator for security group rules (`sg.rule`)
pub const SG_RULE: char = '.';

/// Join the parts of a composite ID
///
/// An empty leading part yields an empty ID, so a resource that was never
/// created keeps no id.
pub fn compose(parts: &[&str], sep: char) -> String {
    match parts.first() {
        None => String::new(),
        Some(first) if first.is_empty() => String::new(),
        Some(_) => parts.join(&sep.to_string()),
    }
}

/// Split a composite ID into exactly `N` parts
///
/// Splitting stops after `N - 1` separators, so the last part may contain
/// the separator itself (CRNs contain `:`).
pub fn parse<const N: usize>(id: &str, sep: char) -> Result<[&str; N]> {
    let parts: Vec<&str> = id.splitn(N, sep).collect();
    let invalid = || ProviderError::InvalidId {
        id: id.to_string(),
        expected: format!("{} parts separated by '{}'", N, sep),
    };
    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid());
    }
    <[&str; N]>::try_from(parts).map_err(|_| invalid())
}
