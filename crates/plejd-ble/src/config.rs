//! Link configuration

use std::time::Duration;

use plejd_core::MeshSettings;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the mesh link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Discovery window, post-connect settle time and reconnect settle delay
    pub connection_timeout_secs: u64,
    /// Write queue drain interval
    pub write_queue_wait_ms: u64,
    /// Backoff before retrying a write the node reported as in progress
    pub write_retry_delay_ms: u64,
    /// Keepalive ping period
    pub ping_interval_ms: u64,
    /// In-progress retries on one frame before it counts as a hard failure
    pub max_transient_retries: u32,
    /// Whether to run the keepalive monitor
    pub keep_alive: bool,
    /// Re-appliable runtime settings
    pub settings: MeshSettings,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 2,
            write_queue_wait_ms: 400,
            write_retry_delay_ms: 1000,
            ping_interval_ms: 3000,
            max_transient_retries: 10,
            keep_alive: true,
            settings: MeshSettings::default(),
        }
    }
}

impl LinkConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn write_queue_wait(&self) -> Duration {
        Duration::from_millis(self.write_queue_wait_ms)
    }

    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Enable or disable the keepalive monitor
    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    pub fn with_settings(mut self, settings: MeshSettings) -> Self {
        self.settings = settings;
        self
    }
}
