use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine the user configuration directory")]
    ConfigDirNotFound,

    #[error(
        "No manifest found. Looked for:\n\
        - the path in IBMFORM_CONFIG\n\
        - ./main.kdl, ./ibmform.kdl\n\
        - ./.ibmform/main.kdl\n\
        - ~/.config/ibmform/main.kdl\n\
        Pass --file to use another location"
    )]
    ManifestNotFound,

    #[error("IBMFORM_CONFIG points to {0}, which does not exist")]
    ConfiguredPathMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
