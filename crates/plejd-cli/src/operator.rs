//! Operator commands read from stdin while the link runs
//!
//! ```text
//! on <address> [brightness]
//! off <address>
//! scene <index>
//! verbose on|off
//! relink
//! status
//! quit
//! ```

use std::str::FromStr;

use plejd_core::DeviceAddress;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    On {
        device: DeviceAddress,
        brightness: Option<u8>,
    },
    Off {
        device: DeviceAddress,
    },
    Scene(u8),
    Verbose(bool),
    Relink,
    Status,
    Quit,
}

impl FromStr for OperatorCommand {
    type Err = CliError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| CliError::InvalidCommand("empty line".to_string()))?;
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("on", [device]) => Self::On {
                device: number(device, "address")?,
                brightness: None,
            },
            ("on", [device, brightness]) => Self::On {
                device: number(device, "address")?,
                brightness: Some(number(brightness, "brightness")?),
            },
            ("off", [device]) => Self::Off {
                device: number(device, "address")?,
            },
            ("scene", [index]) => Self::Scene(number(index, "scene index")?),
            ("verbose", ["on"]) => Self::Verbose(true),
            ("verbose", ["off"]) => Self::Verbose(false),
            ("relink", []) => Self::Relink,
            ("status", []) => Self::Status,
            ("quit", []) | ("exit", []) => Self::Quit,
            _ => return Err(CliError::InvalidCommand(line.trim().to_string())),
        };
        Ok(command)
    }
}

fn number(word: &str, what: &str) -> Result<u8, CliError> {
    word.parse()
        .map_err(|_| CliError::InvalidCommand(format!("{} must be 0-255, got {}", what, word)))
}
