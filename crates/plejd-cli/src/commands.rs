//! Command handlers for the Plejd CLI

use crate::app::PlejdApp;
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::Result;

/// Command dispatcher for handling CLI subcommands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Run `command` against the loaded configuration.
    ///
    /// `config` prints the layers as loaded, before validation, so a missing
    /// or malformed key can still be inspected.
    pub async fn execute(command: Commands, config: AppConfig) -> Result<()> {
        if let Commands::Config = command {
            println!("{}", render_config(&config)?);
            return Ok(());
        }

        let app = PlejdApp::new(config)?;

        match command {
            Commands::Run => app.run().await,
            Commands::Keystream { address } => {
                println!("{}", app.keystream(&address)?);
                Ok(())
            }
            Commands::Catalog => {
                println!("{}", serde_json::to_string_pretty(app.catalog())?);
                Ok(())
            }
            Commands::Config => Ok(()),
        }
    }
}

/// The effective configuration as TOML
pub fn render_config(config: &AppConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
