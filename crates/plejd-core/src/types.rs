//! Core types for the Plejd mesh protocol
//!
//! Newtypes with fixed-size storage so that the length contracts of the
//! cipher engine hold by construction.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, Result};

/// Numeric address of a device (output) on the mesh, as carried in byte 0
/// of every frame.
pub type DeviceAddress = u8;

// ----------------------------------------------------------------------------
// Mesh Key
// ----------------------------------------------------------------------------

/// 16-byte mesh secret shared by every node of a site
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MeshKey([u8; 16]);

impl MeshKey {
    pub const LEN: usize = 16;

    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build a key from a byte slice, rejecting anything that is not 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; 16] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidKeyLength {
                actual: bytes.len(),
            })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl FromStr for MeshKey {
    type Err = CoreError;

    /// Parse the cloud representation of the key: hex, optionally dash-separated
    /// like a UUID.
    fn from_str(s: &str) -> Result<Self> {
        let clean: String = s.trim().chars().filter(|c| *c != '-').collect();
        let bytes = hex::decode(clean)?;
        Self::from_slice(&bytes)
    }
}

// Never print the secret itself.
impl fmt::Debug for MeshKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MeshKey(..)")
    }
}

// ----------------------------------------------------------------------------
// Link Address
// ----------------------------------------------------------------------------

/// Physical address of the connected mesh node, byte-reversed from the
/// address the platform reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkAddress([u8; 6]);

impl LinkAddress {
    pub const LEN: usize = 6;

    /// Wrap bytes that are already in link (reversed) order
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let addr: [u8; 6] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidAddressLength {
                actual: bytes.len(),
            })?;
        Ok(Self(addr))
    }

    /// Derive the link address from a platform identifier.
    ///
    /// Accepts `AA:BB:CC:DD:EE:FF`, `dev_AA_BB_CC_DD_EE_FF` and full BlueZ
    /// object paths such as `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`. The
    /// platform writes the most significant byte first; the mesh expects the
    /// reverse.
    pub fn from_platform_address(address: &str) -> Result<Self> {
        let serial = normalize_serial(address);
        if serial.len() != Self::LEN * 2 {
            return Err(CoreError::InvalidAddressString(address.to_string()));
        }
        let mut bytes: [u8; 6] = hex::decode(&serial)
            .map_err(|_| CoreError::InvalidAddressString(address.to_string()))?
            .try_into()
            .map_err(|_| CoreError::InvalidAddressString(address.to_string()))?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ----------------------------------------------------------------------------
// Address Normalization
// ----------------------------------------------------------------------------

/// Reduce a platform address or object path to the upper-case hex form used
/// as a device serial number in the catalog.
pub fn normalize_serial(address: &str) -> String {
    let last = address.rsplit('/').next().unwrap_or(address);
    let last = last.strip_prefix("dev_").unwrap_or(last);
    last.chars()
        .filter(|c| !matches!(c, '_' | ':' | '-'))
        .collect::<String>()
        .to_ascii_uppercase()
}
