//! Plejd CLI library
//!
//! Configuration loading, operator command parsing and the application loop
//! behind the `plejd` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod operator;

pub use app::PlejdApp;
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use operator::OperatorCommand;
