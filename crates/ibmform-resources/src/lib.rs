//! IBM Cloud resource catalog
//!
//! Each `ibm_*` type implements [`Resource`](ibmform_provider::Resource) or
//! [`DataSource`](ibmform_provider::DataSource) on top of the service clients
//! from `ibmform-client`. [`registry`] wires them all into one [`Registry`].

pub mod cis;
pub mod classic;
mod common;
pub mod container;
mod context;
pub mod is;

pub use context::{Context, Polling};

use ibmform_provider::Registry;

/// Registry with every supported resource and data source
pub fn registry(ctx: Context) -> Registry {
    Registry::new()
        .with_resource(is::IsVpc::new(ctx.clone()))
        .with_resource(is::IsSubnet::new(ctx.clone()))
        .with_resource(is::IsPublicGateway::new(ctx.clone()))
        .with_resource(is::IsFloatingIp::new(ctx.clone()))
        .with_resource(is::IsSshKey::new(ctx.clone()))
        .with_resource(is::IsSecurityGroup::new(ctx.clone()))
        .with_resource(is::IsSecurityGroupRule::new(ctx.clone()))
        .with_resource(is::IsVolume::new(ctx.clone()))
        .with_resource(is::IsInstance::new(ctx.clone()))
        .with_resource(is::IsInstanceTemplate::new(ctx.clone()))
        .with_resource(is::IsDedicatedHostGroup::new(ctx.clone()))
        .with_resource(is::IsDedicatedHost::new(ctx.clone()))
        .with_resource(is::IsVpnGateway::new(ctx.clone()))
        .with_resource(is::IsLb::new(ctx.clone()))
        .with_resource(is::IsLbListener::new(ctx.clone()))
        .with_resource(is::IsLbListenerPolicy::new(ctx.clone()))
        .with_resource(is::IsLbPool::new(ctx.clone()))
        .with_resource(is::IsLbPoolMember::new(ctx.clone()))
        .with_resource(cis::CisDnsRecord::new(ctx.clone()))
        .with_resource(cis::CisRateLimit::new(ctx.clone()))
        .with_resource(cis::CisEdgeFunctionsAction::new(ctx.clone()))
        .with_resource(cis::CisEdgeFunctionsTrigger::new(ctx.clone()))
        .with_resource(container::ContainerVpcCluster::new(ctx.clone()))
        .with_resource(classic::Cdn::new(ctx.clone()))
        .with_data_source(is::IsVpcData::new(ctx.clone()))
        .with_data_source(is::IsImageData::new(ctx.clone()))
        .with_data_source(is::IsVolumeData::new(ctx.clone()))
        .with_data_source(is::IsVolumesData::new(ctx.clone()))
        .with_data_source(is::IsInstanceData::new(ctx.clone()))
        .with_data_source(is::IsDedicatedHostData::new(ctx.clone()))
        .with_data_source(is::IsDedicatedHostsData::new(ctx.clone()))
        .with_data_source(is::IsDedicatedHostProfilesData::new(ctx))
}
