//! Binary command/notification codec for the Plejd mesh
//!
//! Outbound frames are `device(1) ‖ 0x0110 ‖ command(2) ‖ state(1) [‖ level(2)]`.
//! Inbound notifications, once run through the link cipher, carry the source
//! device in byte 0, the command code in bytes 3–4 and the payload from byte 5.

use core::fmt;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::trace;

use crate::events::InboundEvent;
use crate::types::DeviceAddress;

// ----------------------------------------------------------------------------
// Protocol Constants
// ----------------------------------------------------------------------------

/// Command family prefix carried by every outbound light command
pub const COMMAND_FAMILY: u16 = 0x0110;

/// Brightness change (firmware variant reporting with `00c8`)
pub const CMD_DIM_CHANGE: u16 = 0x00c8;

/// Brightness change / dimmed turn-on
pub const CMD_DIM2_CHANGE: u16 = 0x0098;

/// On/off state change
pub const CMD_STATE_CHANGE: u16 = 0x0097;

/// Scene triggered from a wall switch or the app
pub const CMD_SCENE_TRIGGER: u16 = 0x0021;

/// Anything shorter is radio noise
pub const MIN_FRAME_LEN: usize = 5;

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// A light command addressed to one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MeshCommand {
    TurnOn {
        device: DeviceAddress,
        #[serde(default)]
        brightness: Option<u8>,
    },
    TurnOff {
        device: DeviceAddress,
    },
}

impl MeshCommand {
    pub fn device(&self) -> DeviceAddress {
        match self {
            Self::TurnOn { device, .. } | Self::TurnOff { device } => *device,
        }
    }
}

// ----------------------------------------------------------------------------
// Outbound Frame
// ----------------------------------------------------------------------------

/// Plaintext payload ready for the write queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame(SmallVec<[u8; 8]>);

impl OutboundFrame {
    pub fn device(&self) -> DeviceAddress {
        self.0[0]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OutboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// Scale a 0–255 level into the 16-bit quantity the firmware expects.
/// Only the high byte is significant; the low byte mirrors it.
pub fn brightness_level(brightness: u8) -> u16 {
    let b = u16::from(brightness);
    ((b << 8) & 0xFF00) | (b & 0x00FF)
}

fn frame(device: DeviceAddress, command: u16, state: u8, level: Option<u16>) -> OutboundFrame {
    let mut bytes = SmallVec::new();
    bytes.push(device);
    bytes.extend_from_slice(&COMMAND_FAMILY.to_be_bytes());
    bytes.extend_from_slice(&command.to_be_bytes());
    bytes.push(state);
    if let Some(level) = level {
        bytes.extend_from_slice(&level.to_be_bytes());
    }
    OutboundFrame(bytes)
}

/// Encode a command into its wire frame
pub fn encode(command: &MeshCommand) -> OutboundFrame {
    match *command {
        MeshCommand::TurnOn {
            device,
            brightness: None,
        } => frame(device, CMD_STATE_CHANGE, 0x01, None),
        MeshCommand::TurnOn {
            device,
            brightness: Some(b),
        } => frame(device, CMD_DIM2_CHANGE, 0x01, Some(brightness_level(b))),
        MeshCommand::TurnOff { device } => frame(device, CMD_STATE_CHANGE, 0x00, None),
    }
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Decode a decrypted notification frame.
///
/// Short frames and unknown command codes yield `None`; neither is an error.
pub fn decode(frame: &[u8]) -> Option<InboundEvent> {
    if frame.len() < MIN_FRAME_LEN {
        trace!("Ignoring {}-byte notification", frame.len());
        return None;
    }

    let device = frame[0];
    let command = u16::from_be_bytes([frame[3], frame[4]]);

    match command {
        CMD_DIM_CHANGE | CMD_DIM2_CHANGE => {
            let state = *frame.get(5)?;
            let brightness = frame
                .get(6..8)
                .map(|level| (u16::from_be_bytes([level[0], level[1]]) >> 8) as u8);
            Some(InboundEvent::StateChanged {
                device,
                state,
                brightness,
            })
        }
        CMD_STATE_CHANGE => Some(InboundEvent::StateChanged {
            device,
            state: *frame.get(5)?,
            brightness: None,
        }),
        CMD_SCENE_TRIGGER => Some(InboundEvent::SceneTriggered {
            device,
            scene: *frame.get(5)?,
        }),
        other => {
            trace!("Ignoring unknown command {:04x} from device {}", other, device);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brightness_level_mirrors_high_byte() {
        assert_eq!(brightness_level(0), 0x0000);
        assert_eq!(brightness_level(128), 0x8080);
        assert_eq!(brightness_level(255), 0xFFFF);
    }

    #[test]
    fn test_dim_frame_without_level_is_dropped_to_state() {
        // 00c8 with a state byte but no level bytes
        let event = decode(&[0x0b, 0x00, 0x00, 0x00, 0xc8, 0x01]).unwrap();
        assert_eq!(
            event,
            InboundEvent::StateChanged {
                device: 0x0b,
                state: 1,
                brightness: None
            }
        );
    }

    #[test]
    fn test_five_byte_frame_without_payload_is_ignored() {
        assert_eq!(decode(&[0x01, 0x01, 0x10, 0x00, 0x97]), None);
    }

    #[test]
    fn test_command_device_accessor() {
        assert_eq!(MeshCommand::TurnOff { device: 9 }.device(), 9);
        assert_eq!(
            MeshCommand::TurnOn {
                device: 3,
                brightness: Some(1)
            }
            .device(),
            3
        );
    }

    #[test]
    fn test_command_json_shape() {
        let cmd: MeshCommand =
            serde_json::from_str(r#"{"command":"turn_on","device":7,"brightness":200}"#).unwrap();
        assert_eq!(
            cmd,
            MeshCommand::TurnOn {
                device: 7,
                brightness: Some(200)
            }
        );
        let cmd: MeshCommand = serde_json::from_str(r#"{"command":"turn_on","device":7}"#).unwrap();
        assert_eq!(
            cmd,
            MeshCommand::TurnOn {
                device: 7,
                brightness: None
            }
        );
    }
}
