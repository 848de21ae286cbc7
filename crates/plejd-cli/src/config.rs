//! Plejd CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Defaults
//! - `plejd.toml` in the working directory
//! - `~/.config/plejd/config.toml`
//! - Environment variables (`PLEJD_*`, nested keys split on `__`)
//! - Command line flags

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use plejd_ble::LinkConfig;
use plejd_core::{Catalog, MeshKey, MeshSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the Plejd CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Mesh crypto key as hex, dashes allowed
    pub crypto_key: Option<String>,

    /// Device catalog JSON exported from the site
    pub catalog_path: Option<PathBuf>,

    /// When set, the resolved catalog is written here at startup
    pub catalog_dump_path: Option<PathBuf>,

    /// Link timing and behaviour
    pub link: LinkConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Loading(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Failed to load catalog: {0}")]
    Catalog(String),
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from the standard locations and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("plejd.toml"));
        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed("PLEJD_").split("__")))
    }

    /// Load configuration from a specific file, still honouring the environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            return Err(ConfigError::Loading(format!(
                "{} does not exist",
                path.as_ref().display()
            )));
        }
        info!("Loading configuration from {}", path.as_ref().display());
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PLEJD_").split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Loading(e.to_string()))
    }

    /// `~/.config/plejd/config.toml` or the platform equivalent
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("plejd").join("config.toml"))
    }

    /// Apply command line flags over the loaded layers
    pub fn with_overrides(
        mut self,
        crypto_key: Option<String>,
        catalog_path: Option<PathBuf>,
        verbose: bool,
    ) -> Self {
        if crypto_key.is_some() {
            self.crypto_key = crypto_key;
        }
        if catalog_path.is_some() {
            self.catalog_path = catalog_path;
        }
        if verbose {
            self.link = self.link.with_settings(MeshSettings::verbose());
        }
        self
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mesh_key()?;

        if self.link.connection_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Connection timeout must be greater than 0".to_string(),
            ));
        }
        if self.link.write_queue_wait_ms == 0 {
            return Err(ConfigError::Validation(
                "Write queue wait must be greater than 0".to_string(),
            ));
        }
        if self.link.keep_alive && self.link.ping_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Ping interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse the configured crypto key
    pub fn mesh_key(&self) -> Result<MeshKey, ConfigError> {
        let key = self
            .crypto_key
            .as_deref()
            .ok_or_else(|| ConfigError::Validation("No crypto key configured".to_string()))?;
        key.parse()
            .map_err(|e| ConfigError::Validation(format!("Invalid crypto key: {}", e)))
    }

    /// Load the catalog, or an empty one when no path is configured
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        let catalog = match &self.catalog_path {
            Some(path) => Catalog::load(path).map_err(|e| {
                ConfigError::Catalog(format!("{}: {}", path.display(), e))
            })?,
            None => Catalog::default(),
        };

        if let Some(dump) = &self.catalog_dump_path {
            catalog
                .dump_to(dump)
                .map_err(|e| ConfigError::Catalog(format!("dump to {}: {}", dump.display(), e)))?;
            info!("Catalog written to {}", dump.display());
        }

        Ok(catalog)
    }
}
