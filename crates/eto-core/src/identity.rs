//! # Identifiers
//!
//! `Address` identifies investors, contracts and token holders.
//! `ResolutionId` is the caller-chosen key of a governance resolution.
//! Both are fixed-size byte newtypes rendered as `0x`-prefixed hex so they
//! cannot be confused with each other or with amounts.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The null address.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Wrap raw address bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic address from a label: the first 20 bytes of
    /// `sha256(label)`. Used for well-known contract addresses and fixtures.
    pub fn derive(label: &str) -> Self {
        let hash = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[..20]);
        Self(bytes)
    }

    /// Whether this is the null address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", to_hex(&self.0))
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_prefixed_hex::<20>(s)?))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32-byte resolution identifier chosen by the caller.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolutionId([u8; 32]);

impl ResolutionId {
    /// Wrap raw identifier bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an identifier from a human-readable label (`sha256(label)`).
    pub fn from_label(label: &str) -> Self {
        Self(Sha256::digest(label.as_bytes()).into())
    }

    /// Access the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ResolutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", to_hex(&self.0))
    }
}

impl std::fmt::Debug for ResolutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResolutionId({self})")
    }
}

impl FromStr for ResolutionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_prefixed_hex::<32>(s)?))
    }
}

impl Serialize for ResolutionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResolutionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_prefixed_hex<const N: usize>(s: &str) -> Result<[u8; N], CoreError> {
    let hex = s
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::InvalidIdentifier(format!("missing 0x prefix: {s:?}")))?;
    if hex.len() != N * 2 || !hex.is_ascii() {
        return Err(CoreError::InvalidIdentifier(format!(
            "expected {} hex characters, got {:?}",
            N * 2,
            hex
        )));
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| CoreError::InvalidIdentifier(format!("{s:?}: {e}")))?;
    }
    Ok(out)
}
