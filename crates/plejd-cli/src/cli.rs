//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging and per-frame dumps
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Mesh crypto key (hex, dashes allowed)
    #[arg(short, long, env = "PLEJD_CRYPTO_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Device catalog JSON file
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Connect to the mesh and accept operator commands on stdin (default)
    Run,
    /// Print the keystream derived for a node address
    Keystream {
        /// Node address, e.g. AA:BB:CC:DD:EE:FF or a BlueZ device path
        address: String,
    },
    /// Print the resolved device catalog
    Catalog,
    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }
}
