//! VPC API models (generation 2)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to another VPC resource as returned by the API
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Reference {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Reference {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// `{ "id": ... }` identity used in request bodies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// `{ "name": ... }` identity for zones and profiles
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NameRef {
    #[serde(default)]
    pub name: String,
}

impl NameRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// `{ "crn": ... }` identity for encryption keys and certificates
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CrnRef {
    #[serde(default)]
    pub crn: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    #[serde(default)]
    pub address: String,
}

// --- VPC ---

#[derive(Debug, Clone, Deserialize)]
pub struct Vpc {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub classic_access: bool,
    #[serde(default)]
    pub resource_group: Reference,
    pub default_network_acl: Option<Reference>,
    pub default_security_group: Option<Reference>,
    pub default_routing_table: Option<Reference>,
    #[serde(default)]
    pub cse_source_ips: Vec<CseSourceIp>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CseSourceIp {
    pub ip: Address,
    pub zone: NameRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct VpcPrototype {
    pub name: String,
    pub address_prefix_management: String,
    pub classic_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdRef>,
}

// --- Subnets ---

#[derive(Debug, Clone, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    pub ipv4_cidr_block: Option<String>,
    #[serde(default)]
    pub ip_version: String,
    pub total_ipv4_address_count: Option<i64>,
    pub available_ipv4_address_count: Option<i64>,
    pub vpc: Reference,
    pub zone: NameRef,
    pub network_acl: Option<Reference>,
    pub public_gateway: Option<Reference>,
    #[serde(default)]
    pub resource_group: Reference,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubnetPrototype {
    pub name: String,
    pub vpc: IdRef,
    pub zone: NameRef,
    pub ip_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_cidr_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ipv4_address_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_acl: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_gateway: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdRef>,
}

// --- Public gateways and floating IPs ---

#[derive(Debug, Clone, Deserialize)]
pub struct PublicGateway {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    pub vpc: Reference,
    pub zone: NameRef,
    pub floating_ip: Option<PublicGatewayFloatingIp>,
    #[serde(default)]
    pub resource_group: Reference,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicGatewayFloatingIp {
    pub id: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub address: String,
    pub status: String,
    pub zone: NameRef,
    pub target: Option<Reference>,
    #[serde(default)]
    pub resource_group: Reference,
}

// --- SSH keys ---

#[derive(Debug, Clone, Deserialize)]
pub struct Key {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub public_key: String,
    #[serde(rename = "type")]
    pub key_type: String,
    pub length: i64,
    pub fingerprint: String,
    #[serde(default)]
    pub resource_group: Reference,
}

// --- Security groups ---

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub vpc: Reference,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
    #[serde(default)]
    pub resource_group: Reference,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SecurityGroupRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub direction: String,
    #[serde(default = "default_ip_version")]
    pub ip_version: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RuleRemote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_max: Option<i64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

fn default_ip_version() -> String {
    "ipv4".to_string()
}

/// Remote side of a rule: an address, a CIDR block or a security group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleRemote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RuleRemote {
    /// Interpret a user supplied remote as address, CIDR block or group id
    pub fn parse(raw: &str) -> Self {
        if raw.contains('/') {
            Self {
                cidr_block: Some(raw.to_string()),
                ..Self::default()
            }
        } else if raw.parse::<std::net::IpAddr>().is_ok() {
            Self {
                address: Some(raw.to_string()),
                ..Self::default()
            }
        } else {
            Self {
                id: Some(raw.to_string()),
                ..Self::default()
            }
        }
    }

    pub fn as_string(&self) -> String {
        self.address
            .clone()
            .or_else(|| self.cidr_block.clone())
            .or_else(|| self.id.clone())
            .unwrap_or_default()
    }
}

// --- Volumes ---

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    pub capacity: i64,
    pub iops: Option<i64>,
    pub profile: NameRef,
    pub zone: NameRef,
    pub encryption: Option<String>,
    pub encryption_key: Option<CrnRef>,
    #[serde(default)]
    pub resource_group: Reference,
    #[serde(default)]
    pub user_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumePrototype {
    pub name: String,
    pub profile: NameRef,
    pub zone: NameRef,
    pub capacity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<CrnRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdRef>,
}

// --- Instances ---

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    pub profile: NameRef,
    pub vpc: Reference,
    pub zone: NameRef,
    pub image: Option<Reference>,
    pub memory: Option<i64>,
    pub vcpu: Option<Vcpu>,
    pub primary_network_interface: Option<NetworkInterface>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    pub boot_volume_attachment: Option<VolumeAttachment>,
    #[serde(default)]
    pub volume_attachments: Vec<VolumeAttachment>,
    pub dedicated_host: Option<Reference>,
    #[serde(default)]
    pub resource_group: Reference,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vcpu {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInterface {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub subnet: Reference,
    pub primary_ip: Option<Address>,
    pub primary_ipv4_address: Option<String>,
    #[serde(default)]
    pub security_groups: Vec<Reference>,
}

impl NetworkInterface {
    pub fn ipv4_address(&self) -> String {
        self.primary_ip
            .as_ref()
            .map(|ip| ip.address.clone())
            .or_else(|| self.primary_ipv4_address.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeAttachment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub volume: Option<Reference>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstancePrototype {
    pub name: String,
    pub profile: NameRef,
    pub vpc: IdRef,
    pub zone: NameRef,
    pub image: IdRef,
    pub keys: Vec<IdRef>,
    pub primary_network_interface: NetworkInterfacePrototype,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<NetworkInterfacePrototype>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_attachments: Vec<VolumeAttachmentPrototype>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_target: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInterfacePrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub subnet: IdRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ipv4_address: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<IdRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumeAttachmentPrototype {
    pub volume: IdRef,
    pub delete_volume_on_instance_delete: bool,
}

/// Saved instance prototype
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceTemplate {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub profile: NameRef,
    pub vpc: Reference,
    pub zone: NameRef,
    pub image: Option<Reference>,
    #[serde(default)]
    pub keys: Vec<Reference>,
    pub primary_network_interface: Option<NetworkInterfaceTemplate>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterfaceTemplate>,
    pub user_data: Option<String>,
    #[serde(default)]
    pub resource_group: Reference,
    pub created_at: Option<DateTime<Utc>>,
}

/// Network interface of a template, not yet bound to an instance
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInterfaceTemplate {
    #[serde(default)]
    pub name: String,
    pub subnet: Reference,
    pub primary_ipv4_address: Option<String>,
    #[serde(default)]
    pub security_groups: Vec<Reference>,
}

// --- Dedicated hosts ---

#[derive(Debug, Clone, Deserialize)]
pub struct DedicatedHostGroup {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub class: String,
    pub family: String,
    pub zone: NameRef,
    #[serde(default)]
    pub dedicated_hosts: Vec<Reference>,
    #[serde(default)]
    pub supported_instance_profiles: Vec<NameRef>,
    #[serde(default)]
    pub resource_group: Reference,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedicatedHost {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub lifecycle_state: String,
    pub state: String,
    pub instance_placement_enabled: bool,
    pub provisionable: Option<bool>,
    pub profile: NameRef,
    pub group: Reference,
    pub zone: NameRef,
    pub memory: Option<i64>,
    pub available_memory: Option<i64>,
    pub vcpu: Option<Vcpu>,
    pub available_vcpu: Option<Vcpu>,
    pub socket_count: Option<i64>,
    #[serde(default)]
    pub instances: Vec<Reference>,
    #[serde(default)]
    pub supported_instance_profiles: Vec<NameRef>,
    #[serde(default)]
    pub resource_group: Reference,
    pub created_at: Option<DateTime<Utc>>,
}

/// Fixed or ranged profile property such as memory or socket count
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileValue {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: Option<Value>,
    pub default: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub step: Option<i64>,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedicatedHostProfile {
    pub name: String,
    pub class: String,
    pub family: String,
    #[serde(default)]
    pub memory: ProfileValue,
    #[serde(default)]
    pub socket_count: ProfileValue,
    #[serde(default)]
    pub vcpu_architecture: ProfileValue,
    #[serde(default)]
    pub vcpu_count: ProfileValue,
    #[serde(default)]
    pub supported_instance_profiles: Vec<NameRef>,
}

// --- VPN gateways ---

#[derive(Debug, Clone, Deserialize)]
pub struct VpnGateway {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub mode: String,
    pub subnet: Reference,
    #[serde(default)]
    pub members: Vec<VpnGatewayMember>,
    #[serde(default)]
    pub resource_group: Reference,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VpnGatewayMember {
    pub public_ip: Address,
    pub private_ip: Option<Address>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: String,
}

// --- Load balancers ---

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub is_public: bool,
    #[serde(default)]
    pub hostname: String,
    pub operating_status: String,
    pub provisioning_status: String,
    #[serde(default)]
    pub subnets: Vec<Reference>,
    #[serde(default)]
    pub security_groups: Vec<Reference>,
    #[serde(default)]
    pub public_ips: Vec<Address>,
    #[serde(default)]
    pub private_ips: Vec<Address>,
    pub profile: Option<NameRef>,
    #[serde(default)]
    pub listeners: Vec<Reference>,
    #[serde(default)]
    pub pools: Vec<Reference>,
    #[serde(default)]
    pub resource_group: Reference,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerListener {
    pub id: String,
    pub port: i64,
    pub protocol: String,
    pub default_pool: Option<Reference>,
    pub certificate_instance: Option<CrnRef>,
    pub connection_limit: Option<i64>,
    pub provisioning_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerListenerPolicy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub action: String,
    pub priority: i64,
    pub provisioning_status: String,
    #[serde(default)]
    pub rules: Vec<Reference>,
    pub target: Option<PolicyTarget>,
}

/// Pool for `forward`, redirect URL and status for `redirect`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyTarget {
    pub id: Option<String>,
    pub http_status_code: Option<i64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerListenerPolicyRule {
    pub id: String,
    pub condition: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub field: Option<String>,
    pub value: String,
    #[serde(default)]
    pub provisioning_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerPool {
    pub id: String,
    pub name: String,
    pub algorithm: String,
    pub protocol: String,
    pub health_monitor: HealthMonitor,
    pub session_persistence: Option<SessionPersistence>,
    pub provisioning_status: String,
    #[serde(default)]
    pub members: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthMonitor {
    pub delay: i64,
    pub max_retries: i64,
    pub timeout: i64,
    #[serde(rename = "type")]
    pub monitor_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionPersistence {
    #[serde(rename = "type")]
    pub persistence_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerPoolMember {
    pub id: String,
    pub port: i64,
    pub target: MemberTarget,
    pub weight: Option<i64>,
    #[serde(default)]
    pub health: String,
    pub provisioning_status: String,
}

/// Pool member target: an IP address or an instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemberTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

// --- Images ---

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    pub visibility: String,
    pub encryption: Option<String>,
    pub operating_system: Option<OperatingSystem>,
    pub file: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperatingSystem {
    pub name: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_remote_parse() {
        assert_eq!(RuleRemote::parse("10.0.0.0/24").cidr_block.as_deref(), Some("10.0.0.0/24"));
        assert_eq!(RuleRemote::parse("10.0.0.5").address.as_deref(), Some("10.0.0.5"));
        assert_eq!(RuleRemote::parse("r006-sg").id.as_deref(), Some("r006-sg"));
        assert_eq!(RuleRemote::parse("r006-sg").as_string(), "r006-sg");
    }

    #[test]
    fn test_security_group_rule_wire_format() {
        let rule = SecurityGroupRule {
            direction: "inbound".into(),
            ip_version: "ipv4".into(),
            protocol: "icmp".into(),
            icmp_type: Some(8),
            ..Default::default()
        };
        let v = serde_json::to_value(&rule).unwrap();
        assert_eq!(v, json!({"direction": "inbound", "ip_version": "ipv4", "protocol": "icmp", "type": 8}));
    }

    #[test]
    fn test_instance_primary_ip_fallback() {
        let nic: NetworkInterface = serde_json::from_value(json!({
            "id": "nic-1",
            "subnet": {"id": "s-1"},
            "primary_ipv4_address": "10.240.0.4"
        }))
        .unwrap();
        assert_eq!(nic.ipv4_address(), "10.240.0.4");
    }
}
