//! Device catalog
//!
//! The catalog is provisioned externally (from the cloud site description)
//! and maps mesh addresses and node serial numbers to device metadata.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::MeshCommand;
use crate::errors::Result;
use crate::scene::StaticSceneBook;
use crate::types::{normalize_serial, DeviceAddress};

// ----------------------------------------------------------------------------
// Catalog Entries
// ----------------------------------------------------------------------------

/// Kind of output a catalog entry controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Light,
    Switch,
    Scene,
}

/// One addressable output on the mesh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDevice {
    /// Numeric mesh address (frame byte 0)
    pub address: DeviceAddress,
    /// Hardware serial; doubles as the node's BLE address without separators
    #[serde(default)]
    pub serial_number: Option<String>,
    pub name: String,
    #[serde(default)]
    pub dimmable: bool,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Output index on multi-output hardware
    #[serde(default)]
    pub output_index: u8,
}

/// A scene and the commands it replays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDefinition {
    pub index: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<MeshCommand>,
}

// ----------------------------------------------------------------------------
// Catalog
// ----------------------------------------------------------------------------

/// Ordered collection of known devices and scenes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub devices: Vec<CatalogDevice>,
    #[serde(default)]
    pub scenes: Vec<SceneDefinition>,
}

impl Catalog {
    pub fn new(devices: Vec<CatalogDevice>) -> Self {
        Self {
            devices,
            scenes: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json(&json)?;
        debug!(
            "Loaded {} device(s) and {} scene(s) from {}",
            catalog.devices.len(),
            catalog.scenes.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    /// Write the catalog as pretty JSON. Diagnostic side channel only.
    pub fn dump_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// First device whose serial matches the given platform address or path
    pub fn find_by_serial(&self, address: &str) -> Option<&CatalogDevice> {
        let wanted = normalize_serial(address);
        self.devices.iter().find(|device| {
            device
                .serial_number
                .as_deref()
                .map(normalize_serial)
                .is_some_and(|serial| serial == wanted)
        })
    }

    pub fn find_by_address(&self, address: DeviceAddress) -> Option<&CatalogDevice> {
        self.devices
            .iter()
            .find(|device| device.address == address && device.device_type != DeviceType::Scene)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn scene_book(&self) -> StaticSceneBook {
        self.scenes
            .iter()
            .fold(StaticSceneBook::new(), |book, scene| {
                book.with_scene(scene.index, scene.steps.clone())
            })
    }
}
