//! Error handling for the rowbridge CLI

use rowbridge_runtime::SupervisorError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
