use ibmform_provider::{Diagnostic, ProviderError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}\nReason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Unknown provider '{0}' (only \"ibm\" is supported)")]
    UnknownProvider(String),

    #[error("Duplicate declaration of {0}")]
    DuplicateAddress(String),

    #[error("Invalid reference '${{{0}}}'")]
    InvalidReference(String),

    #[error("{address} references undeclared {target}")]
    UnknownReference { address: String, target: String },

    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("{address}: {}", format_diagnostics(.diagnostics))]
    Invalid {
        address: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("{address}: value of {attribute} is not known yet")]
    UnresolvedValue { address: String, attribute: String },

    #[error("Not declared in the manifest: {0}")]
    NotDeclared(String),

    #[error("{0} is already managed")]
    AlreadyManaged(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ManifestError>;
