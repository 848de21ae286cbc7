//! Plejd CLI entry point

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use plejd_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(&cli)?;
    setup_logging(config.link.settings.verbose);

    if let Err(e) = CommandDispatcher::execute(cli.command(), config).await {
        error!("Command failed: {}", e);
        return Err(e);
    }
    Ok(())
}

/// Setup logging based on verbosity level; `RUST_LOG` takes precedence
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration layers, then apply command line flags
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load()?,
    };
    Ok(config.with_overrides(cli.key.clone(), cli.catalog.clone(), cli.verbose))
}
