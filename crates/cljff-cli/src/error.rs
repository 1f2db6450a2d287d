use cljff::core::forcefield::error::ConfigError;
use cljff::core::forcefield::params::ParamLoadError;
use cljff::engine::error::CljError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] CljError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Forcefield(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] ParamLoadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
