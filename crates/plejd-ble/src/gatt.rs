//! Abstract GATT transport
//!
//! The supervisor never talks to a Bluetooth stack directly. It drives a
//! [`MeshTransport`] and listens to the [`TransportEvent`] stream the transport
//! feeds. The platform implementation lives in [`crate::platform`]; tests
//! supply their own.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;
use crate::protocol::{
    AUTH_CHARACTERISTIC_UUID, DATA_CHARACTERISTIC_UUID, LAST_DATA_CHARACTERISTIC_UUID,
    PING_CHARACTERISTIC_UUID,
};

// ----------------------------------------------------------------------------
// Node Identity
// ----------------------------------------------------------------------------

/// Platform handle for a discovered node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Properties read from a node before connecting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    pub rssi: Option<i16>,
    /// Hardware address as the platform reports it, e.g. `AA:BB:CC:DD:EE:FF`
    pub address: Option<String>,
}

/// A resolved GATT service and the characteristics it exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Asynchronous signals from the Bluetooth stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    NodeDiscovered { node: NodeId, services: Vec<Uuid> },
    Notification { characteristic: Uuid, value: Vec<u8> },
    Disconnected { node: NodeId },
}

pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create the channel a transport reports its events on
pub fn transport_event_channel() -> (TransportEventSender, TransportEventReceiver) {
    mpsc::unbounded_channel()
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// GATT operations the link supervisor needs
///
/// A transport holds at most one connected node at a time. Characteristic
/// operations address that node.
#[async_trait]
pub trait MeshTransport: Send {
    /// Drop nodes advertising `service` left over from a previous session.
    /// Returns how many were removed.
    async fn purge_stale_nodes(&mut self, service: Uuid) -> Result<usize, TransportError>;

    /// Start reporting [`TransportEvent::NodeDiscovered`] for nodes advertising `service`
    async fn start_scan(&mut self, service: Uuid) -> Result<(), TransportError>;

    async fn stop_scan(&mut self) -> Result<(), TransportError>;

    async fn inspect(&mut self, node: &NodeId) -> Result<NodeInfo, TransportError>;

    async fn connect(&mut self, node: &NodeId) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Resolve the connected node's GATT database
    async fn services(&mut self) -> Result<Vec<GattService>, TransportError>;

    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError>;

    async fn read(&mut self, characteristic: Uuid) -> Result<Vec<u8>, TransportError>;

    /// Start reporting [`TransportEvent::Notification`] for `characteristic`
    async fn subscribe(&mut self, characteristic: Uuid) -> Result<(), TransportError>;

    /// Stop every notification subscription on the connected node
    async fn unsubscribe_all(&mut self) -> Result<(), TransportError>;
}

// ----------------------------------------------------------------------------
// Characteristic Bindings
// ----------------------------------------------------------------------------

/// Characteristics bound on the connected node's mesh service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicSet {
    pub data: Option<Uuid>,
    pub last_data: Option<Uuid>,
    pub auth: Option<Uuid>,
    pub ping: Option<Uuid>,
}

impl CharacteristicSet {
    /// Bind whichever mesh characteristics `service` exposes
    pub fn bind(service: &GattService) -> Self {
        let find = |wanted: Uuid| service.characteristics.iter().copied().find(|c| *c == wanted);
        Self {
            data: find(DATA_CHARACTERISTIC_UUID),
            last_data: find(LAST_DATA_CHARACTERISTIC_UUID),
            auth: find(AUTH_CHARACTERISTIC_UUID),
            ping: find(PING_CHARACTERISTIC_UUID),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PLEJD_SERVICE_UUID;

    #[test]
    fn test_bind_partial_service() {
        let service = GattService {
            uuid: PLEJD_SERVICE_UUID,
            characteristics: vec![DATA_CHARACTERISTIC_UUID, AUTH_CHARACTERISTIC_UUID],
        };
        let mut set = CharacteristicSet::bind(&service);
        assert_eq!(set.data, Some(DATA_CHARACTERISTIC_UUID));
        assert_eq!(set.auth, Some(AUTH_CHARACTERISTIC_UUID));
        assert!(set.last_data.is_none());
        assert!(set.ping.is_none());

        set.clear();
        assert_eq!(set, CharacteristicSet::default());
    }
}
