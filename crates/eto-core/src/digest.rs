//! # Promise and Failure-Code Hashes
//!
//! Resolutions remember two hashes: the promise (over the canonical call
//! that opened them) and, when they fail, a code derived from the failure
//! reason. Both are SHA-256 and both are a [`ContentDigest`].
//!
//! Structured payloads are hashed only through [`CanonicalBytes`]. Free-text
//! reasons go through [`sha256_str`] since a `&str` has one encoding.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest(pub [u8; 32]);

impl ContentDigest {
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Hash a canonically encoded payload.
pub fn sha256_digest(payload: &CanonicalBytes) -> ContentDigest {
    ContentDigest(Sha256::digest(payload.as_bytes()).into())
}

/// Hash a failure reason or other free text.
pub fn sha256_str(text: &str) -> ContentDigest {
    ContentDigest(Sha256::digest(text.as_bytes()).into())
}
