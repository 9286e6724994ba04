//! SHA-256 content hashes over canonical JSON and raw bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::AxfError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal hash for the provided payload using canonical JSON ordering.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, AxfError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

/// Hashes raw bytes (e.g. an input file) into a lowercase hex digest.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
