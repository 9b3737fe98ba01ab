//! Kubernetes Service (`ibm_container_*`) resources

pub mod vpc_cluster;

pub use vpc_cluster::ContainerVpcCluster;
