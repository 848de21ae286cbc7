//! Error types for the mesh link

use plejd_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Errors reported by a GATT transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The node is still busy with a previous operation; retry the same call
    #[error("Operation in progress")]
    InProgress,

    #[error("BLE adapter not available: {0}")]
    AdapterNotAvailable(String),

    #[error("Failed to start scanning: {0}")]
    ScanRejected(String),

    #[error("Failed to connect to node: {0}")]
    ConnectFailed(String),

    #[error("Failed to discover services: {0}")]
    ServiceDiscovery(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("GATT operation failed: {0}")]
    Io(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Not connected")]
    NotConnected,
}

impl TransportError {
    /// Transient errors are retried in place without relinking
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

// ----------------------------------------------------------------------------
// Link Errors
// ----------------------------------------------------------------------------

/// Errors surfaced by the link supervisor
#[derive(Error, Debug)]
pub enum LinkError {
    /// No adapter, or the adapter refused to scan. Not recoverable by relinking.
    #[error("Discovery failed: {0}")]
    Discovery(TransportError),

    #[error("No mesh node accepted a connection")]
    NoCandidate,

    #[error("Mesh service not found on the connected node")]
    MeshServiceMissing,

    #[error("Auth characteristic not found on the connected node")]
    AuthCharacteristicMissing,

    #[error("Data characteristic not found on the connected node")]
    DataCharacteristicMissing,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Core(#[from] CoreError),

    #[error("Transport event stream closed")]
    EventStreamClosed,

    #[error("Link supervisor has shut down")]
    Shutdown,
}

impl LinkError {
    /// Fatal errors end the supervisor instead of starting another relink cycle
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Discovery(_) | Self::EventStreamClosed | Self::Shutdown
        )
    }

    /// Whether upstream should see a `ConnectFailed` event for this error
    pub fn is_connect_failure(&self) -> bool {
        !self.is_fatal() && !matches!(self, Self::Authentication(_))
    }
}
