//! BLE protocol constants for the Plejd mesh

use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Mesh GATT service advertised by every node
pub const PLEJD_SERVICE_UUID: Uuid = Uuid::from_u128(0x31ba0001_6085_4726_be45_040c957391b5);

/// Encrypted command frames are written here
pub const DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x31ba0004_6085_4726_be45_040c957391b5);

/// Encrypted state notifications arrive here
pub const LAST_DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x31ba0005_6085_4726_be45_040c957391b5);

/// Challenge-response authentication
pub const AUTH_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x31ba0009_6085_4726_be45_040c957391b5);

/// Keepalive ping/pong
pub const PING_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x31ba000a_6085_4726_be45_040c957391b5);

// ----------------------------------------------------------------------------
// Handshake
// ----------------------------------------------------------------------------

/// Written to the auth characteristic to make the node issue a challenge
pub const AUTH_TRIGGER: [u8; 1] = [0x00];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_strings() {
        assert_eq!(
            PLEJD_SERVICE_UUID.to_string(),
            "31ba0001-6085-4726-be45-040c957391b5"
        );
        assert_eq!(
            PING_CHARACTERISTIC_UUID.to_string(),
            "31ba000a-6085-4726-be45-040c957391b5"
        );
    }
}
