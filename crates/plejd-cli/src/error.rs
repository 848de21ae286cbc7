//! Error handling for the Plejd CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Mesh protocol error: {0}")]
    Core(#[from] plejd_core::CoreError),

    #[error("Mesh link error: {0}")]
    Link(#[from] plejd_ble::LinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Link task failed: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
