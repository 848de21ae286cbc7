//! Events produced by the mesh link

use serde::Serialize;

use crate::catalog::CatalogDevice;
use crate::types::{DeviceAddress, LinkAddress};

/// A decoded notification frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InboundEvent {
    StateChanged {
        device: DeviceAddress,
        state: u8,
        brightness: Option<u8>,
    },
    SceneTriggered {
        device: DeviceAddress,
        scene: u8,
    },
}

/// Everything the link reports upstream to the bridge layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeshEvent {
    StateChanged {
        device: DeviceAddress,
        state: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        brightness: Option<u8>,
    },
    SceneTriggered {
        device: DeviceAddress,
        scene: u8,
    },
    /// Authenticated and bound to a mesh node
    Connected {
        address: LinkAddress,
        device: Option<CatalogDevice>,
    },
    ConnectFailed {
        reason: String,
    },
    PingSuccess {
        value: u8,
    },
    PingFailed {
        reason: String,
    },
    /// A frame was dropped after its replay budget ran out
    SendFailed {
        device: DeviceAddress,
        reason: String,
    },
}

impl From<InboundEvent> for MeshEvent {
    fn from(event: InboundEvent) -> Self {
        match event {
            InboundEvent::StateChanged {
                device,
                state,
                brightness,
            } => MeshEvent::StateChanged {
                device,
                state,
                brightness,
            },
            InboundEvent::SceneTriggered { device, scene } => {
                MeshEvent::SceneTriggered { device, scene }
            }
        }
    }
}
