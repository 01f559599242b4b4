//! Cryptographic utility functions

use anyhow::{Result, bail};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a cryptographically secure random key
pub fn generate_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Generate a 256-bit (32 byte) signing key
pub fn generate_signing_key() -> Vec<u8> {
    generate_key(32)
}

/// Decode a hex string to bytes
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let value = value.trim();
    if !value.len().is_multiple_of(2) {
        bail!("Invalid hex string length");
    }
    hex::decode(value).map_err(|_| anyhow::anyhow!("Invalid hex character"))
}

/// Encode bytes to a lowercase hex string
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// SHA-256 of a UTF-8 string, hex encoded (migration checksums)
pub fn sha256_hex(data: &str) -> String {
    sha256_bytes_hex(data.as_bytes())
}

/// SHA-256 of raw bytes, hex encoded (content-addressed file storage)
pub fn sha256_bytes_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Whether a string looks like a SHA-256 hex digest
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}
