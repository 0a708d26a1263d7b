//! Checksum of SkyPortal plan payloads.
//!
//! Stored with every plan so a re-fetched payload can be told apart from a
//! revised one carrying the same name.

use sha2::{Digest, Sha256};

/// SHA-256 of a payload, hex encoded.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
