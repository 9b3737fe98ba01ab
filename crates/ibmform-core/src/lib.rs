//! ibmform manifest handling and execution engine
//!
//! A [`Manifest`] is parsed from KDL, its `${...}` references form a
//! [`DependencyGraph`], and the [`Engine`] turns manifest plus state into a
//! plan and executes it against the resource registry.

pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod parser;
pub mod reference;

pub use engine::Engine;
pub use error::{ManifestError, Result};
pub use graph::DependencyGraph;
pub use model::{Manifest, Node, NodeKind, ProviderBlock};
pub use parser::{VAR_ENV_PREFIX, parse_manifest_file, parse_manifest_str};
pub use reference::{Reference, Values};
