//! Bluetooth Low Energy link engine for the Plejd lighting mesh
//!
//! This crate keeps one authenticated GATT link to the mesh alive and turns it
//! into a typed command/event interface for the bridge layer.
//!
//! ## Architecture
//!
//! - [`config`] - Link configuration and timing knobs
//! - [`error`] - Transport and link error taxonomy
//! - [`protocol`] - Mesh service and characteristic UUIDs
//! - [`gatt`] - Abstract GATT transport the supervisor drives
//! - [`platform`] - btleplug-backed transport
//! - [`discovery`] - Candidate collection and ranking
//! - [`write_queue`] - Serialized outbound frame delivery
//! - [`keepalive`] - Ping/pong liveness check
//! - [`supervisor`] - Discovery → connect → authenticate → active state machine
//! - [`handle`] - Cloneable upstream handle
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use plejd_ble::{platform_link, LinkConfig};
//! use plejd_core::{Catalog, MeshKey};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key: MeshKey = "00112233-4455-6677-8899-aabbccddeeff".parse()?;
//! let (supervisor, handle, mut events) =
//!     platform_link(key, Arc::new(Catalog::default()), LinkConfig::default()).await?;
//!
//! tokio::spawn(supervisor.run());
//! handle.turn_on(11, Some(128))?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod gatt;
pub mod handle;
pub mod keepalive;
pub mod platform;
pub mod protocol;
mod purge;
pub mod supervisor;
pub mod write_queue;

// Public API exports
pub use config::LinkConfig;
pub use error::{LinkError, TransportError};
pub use gatt::{
    transport_event_channel, CharacteristicSet, GattService, MeshTransport, NodeId, NodeInfo,
    TransportEvent, TransportEventReceiver, TransportEventSender,
};
pub use handle::{MeshEventReceiver, MeshHandle};
pub use platform::{platform_link, BtleplugTransport};
pub use protocol::{
    AUTH_CHARACTERISTIC_UUID, DATA_CHARACTERISTIC_UUID, LAST_DATA_CHARACTERISTIC_UUID,
    PING_CHARACTERISTIC_UUID, PLEJD_SERVICE_UUID,
};
pub use supervisor::{LinkCommand, LinkDiagnostics, LinkState, LinkSupervisor};
