//! VPC infrastructure (`ibm_is_*`) resources and data sources

pub mod dedicated_host;
pub mod floating_ip;
pub mod image;
pub mod instance;
pub mod instance_template;
pub mod lb;
pub mod lb_listener;
pub mod lb_listener_policy;
pub mod lb_pool;
pub mod lb_pool_member;
pub mod public_gateway;
pub mod security_group;
pub mod ssh_key;
pub mod subnet;
pub mod volume;
pub mod vpc;
pub mod vpn_gateway;

pub use dedicated_host::{
    IsDedicatedHost, IsDedicatedHostData, IsDedicatedHostGroup, IsDedicatedHostProfilesData,
    IsDedicatedHostsData,
};
pub use floating_ip::IsFloatingIp;
pub use image::IsImageData;
pub use instance::{IsInstance, IsInstanceData};
pub use instance_template::IsInstanceTemplate;
pub use lb::IsLb;
pub use lb_listener::IsLbListener;
pub use lb_listener_policy::IsLbListenerPolicy;
pub use lb_pool::IsLbPool;
pub use lb_pool_member::IsLbPoolMember;
pub use public_gateway::IsPublicGateway;
pub use security_group::{IsSecurityGroup, IsSecurityGroupRule};
pub use ssh_key::IsSshKey;
pub use subnet::IsSubnet;
pub use volume::{IsVolume, IsVolumeData, IsVolumesData};
pub use vpc::{IsVpc, IsVpcData};
pub use vpn_gateway::IsVpnGateway;
