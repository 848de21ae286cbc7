//! Plejd Mesh Core Protocol Implementation
//!
//! This crate provides the pure, I/O-free half of the Plejd BLE lighting mesh
//! protocol: key and address types, the per-link stream cipher, the binary
//! command/notification codec, and the device catalog used to resolve
//! discovered mesh nodes to known devices.
//!
//! Everything that touches a radio lives in `plejd-ble`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod catalog;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod events;
pub mod scene;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use catalog::{Catalog, CatalogDevice, DeviceType, SceneDefinition};
pub use codec::{decode, encode, MeshCommand, OutboundFrame};
pub use config::MeshSettings;
pub use crypto::LinkCipher;
pub use errors::{CoreError, Result};
pub use events::{InboundEvent, MeshEvent};
pub use scene::{SceneBook, StaticSceneBook};
pub use types::{normalize_serial, DeviceAddress, LinkAddress, MeshKey};
