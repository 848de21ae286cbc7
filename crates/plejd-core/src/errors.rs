//! Error types for the Plejd mesh core protocol

use thiserror::Error;

// ----------------------------------------------------------------------------
// Core Error Type
// ----------------------------------------------------------------------------

/// Errors raised by the pure protocol layer
///
/// Every variant here is a contract violation detected before any
/// cryptographic or codec work is attempted; nothing is truncated or padded.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Mesh key must be 16 bytes, got {actual}")]
    InvalidKeyLength { actual: usize },

    #[error("Mesh key is not valid hex: {0}")]
    InvalidKeyHex(#[from] hex::FromHexError),

    #[error("Link address must be 6 bytes, got {actual}")]
    InvalidAddressLength { actual: usize },

    #[error("Cannot derive a link address from '{0}'")]
    InvalidAddressString(String),

    #[error("Authentication challenge must be 16 bytes, got {actual}")]
    InvalidChallengeLength { actual: usize },

    #[error("Catalog error: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("Catalog I/O error: {0}")]
    CatalogIo(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, CoreError>;
