//! Link cipher for the Plejd mesh
//!
//! The mesh uses a single-block AES-128 keystream bound to the physical
//! address of the connected node. Payloads are XORed against that keystream,
//! so the same transform both encrypts and decrypts.
//!
//! Authentication is a challenge-response over the mesh key: the node hands
//! out 16 random bytes and expects `fold(sha256(key ^ challenge))` back.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use sha2::{Digest, Sha256};

use crate::errors::{CoreError, Result};
use crate::types::{LinkAddress, MeshKey};

/// Size of the derived keystream block
pub const KEYSTREAM_LEN: usize = 16;

/// Size of the authentication challenge and response
pub const CHALLENGE_LEN: usize = 16;

// ----------------------------------------------------------------------------
// Keystream and Transform
// ----------------------------------------------------------------------------

/// Derive the per-link keystream: AES-128-ECB(key, addr ‖ addr ‖ addr[0..4])
pub fn derive_keystream(key: &MeshKey, address: &LinkAddress) -> [u8; KEYSTREAM_LEN] {
    let addr = address.as_bytes();
    let mut block = [0u8; KEYSTREAM_LEN];
    block[..6].copy_from_slice(addr);
    block[6..12].copy_from_slice(addr);
    block[12..].copy_from_slice(&addr[..4]);

    let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));
    let mut block = GenericArray::clone_from_slice(&block);
    cipher.encrypt_block(&mut block);

    let mut keystream = [0u8; KEYSTREAM_LEN];
    keystream.copy_from_slice(&block);
    keystream
}

/// XOR `data` against the link keystream. Self-inverse.
pub fn transform(key: &MeshKey, address: &LinkAddress, data: &[u8]) -> Vec<u8> {
    apply_keystream(&derive_keystream(key, address), data)
}

fn apply_keystream(keystream: &[u8; KEYSTREAM_LEN], data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(keystream.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

// ----------------------------------------------------------------------------
// Challenge Response
// ----------------------------------------------------------------------------

/// Compute the authentication response for a challenge read from the node
pub fn challenge_response(key: &MeshKey, challenge: &[u8; CHALLENGE_LEN]) -> [u8; CHALLENGE_LEN] {
    let mut mixed = [0u8; CHALLENGE_LEN];
    for (out, (k, c)) in mixed
        .iter_mut()
        .zip(key.as_bytes().iter().zip(challenge.iter()))
    {
        *out = k ^ c;
    }

    let digest = Sha256::digest(mixed);
    let (head, tail) = digest.split_at(CHALLENGE_LEN);

    let mut response = [0u8; CHALLENGE_LEN];
    for (out, (a, b)) in response.iter_mut().zip(head.iter().zip(tail.iter())) {
        *out = a ^ b;
    }
    response
}

/// Slice entry point for challenges coming straight off the radio
pub fn challenge_response_from_slice(key: &MeshKey, challenge: &[u8]) -> Result<[u8; CHALLENGE_LEN]> {
    let challenge: &[u8; CHALLENGE_LEN] =
        challenge
            .try_into()
            .map_err(|_| CoreError::InvalidChallengeLength {
                actual: challenge.len(),
            })?;
    Ok(challenge_response(key, challenge))
}

// ----------------------------------------------------------------------------
// Link Cipher
// ----------------------------------------------------------------------------

/// Cipher bound to one physical link
///
/// Only constructible from both a key and a link address, so no frame can be
/// transformed before the link is known.
#[derive(Clone)]
pub struct LinkCipher {
    address: LinkAddress,
    keystream: [u8; KEYSTREAM_LEN],
}

impl LinkCipher {
    pub fn new(key: &MeshKey, address: LinkAddress) -> Self {
        Self {
            keystream: derive_keystream(key, &address),
            address,
        }
    }

    pub fn address(&self) -> &LinkAddress {
        &self.address
    }

    /// Encrypt or decrypt a frame
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        apply_keystream(&self.keystream, data)
    }
}

impl core::fmt::Debug for LinkCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LinkCipher")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
