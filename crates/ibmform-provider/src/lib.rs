//! ibmform provider abstractions
//!
//! This crate defines how a resource type is described and driven:
//! an attribute [`Schema`], the [`ResourceData`] attribute model handed to
//! CRUD callbacks, the [`Resource`] and [`DataSource`] traits, and the
//! shared plumbing every implementation needs (composite IDs, state-change
//! waiters, plan types and the state file).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  ibmform CLI                     │
//! │          (validate/plan/apply/destroy)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                ibmform-core                      │
//! │     KDL manifest, references, graph, engine      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │              ibmform-provider                    │
//! │  trait Resource / DataSource, Schema, Registry   │
//! │  ResourceData, StateChangeConf, StateManager     │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼─────────────┐  ┌──────────────────────┐
//! │  ibmform-resources  │──▶    ibmform-client     │
//! │ ibm_is_*, ibm_cis_* │  │ IAM, VPC, CIS, IKS   │
//! └─────────────────────┘  └──────────────────────┘
//! ```

pub mod action;
pub mod data;
pub mod error;
pub mod flex;
pub mod id;
pub mod registry;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod state;
pub mod waiter;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use data::ResourceData;
pub use error::{ProviderError, Result};
pub use registry::Registry;
pub use resource::{DataSource, Operation, Resource, Timeouts, parse_duration};
pub use retry::RetryConfig;
pub use schema::{
    Attribute, AttributeChange, AttributeType, Diagnostic, Schema, Severity, UNKNOWN, Validator,
    is_unknown,
};
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
pub use waiter::StateChangeConf;
