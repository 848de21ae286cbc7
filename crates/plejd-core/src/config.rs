//! Runtime settings shared by the link components

use serde::{Deserialize, Serialize};

/// Settings that can be re-applied while the link is running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSettings {
    /// Log every frame and keepalive round trip
    #[serde(default)]
    pub verbose: bool,
}

impl MeshSettings {
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}
