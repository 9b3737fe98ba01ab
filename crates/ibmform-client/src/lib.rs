//! IBM Cloud REST clients for ibmform
//!
//! A [`Session`] owns the HTTP client, the IAM authenticator and the
//! resolved endpoints. Service clients are cheap handles created from it:
//!
//! - [`VpcClient`]: VPC Infrastructure (generation 2)
//! - [`CisClient`]: Cloud Internet Services (DNS, rate limits, edge functions)
//! - [`CdnClient`]: CDN domain mappings on the classic infrastructure API
//! - [`ContainerClient`]: Kubernetes Service VPC clusters
//! - [`TaggingClient`]: Global Tagging

pub mod cdn;
pub mod cis;
pub mod config;
pub mod container;
pub mod error;
pub mod iam;
pub mod session;
pub mod tagging;
pub mod vpc;

// Re-exports
pub use cdn::CdnClient;
pub use cis::CisClient;
pub use config::{ClientConfig, Endpoints, env_fallback};
pub use container::ContainerClient;
pub use error::{ClientError, Result};
pub use iam::{AuthStatus, IamAuthenticator};
pub use session::{AuthScheme, Session};
pub use tagging::{TaggingClient, env_tags, with_env_tags};
pub use vpc::VpcClient;
