use std::io;

use goliath_config::InvalidConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum InitError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// Override not of the form `key=value`.
    #[error("invalid override '{0}', expected key=value")]
    InvalidOverride(String),

    /// Override path goes through a key that holds a plain value.
    #[error("can't override inside non-table key '{0}'")]
    TraverseNonTableAt(String),

    #[error("config root is not a table")]
    NotATable,

    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid: {0}")]
    Invalid(#[from] InvalidConfig),
}
