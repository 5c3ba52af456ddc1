//! # Error Types
//!
//! Errors produced by the foundational types. Engine crates wrap
//! [`CoreError`] through `#[from]` so an overflow deep inside balance
//! arithmetic surfaces unchanged at the public operation.

use thiserror::Error;

/// Errors raised by core primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Checked addition or multiplication overflowed.
    #[error("arithmetic overflow in {op}")]
    Overflow {
        /// The operation that overflowed.
        op: &'static str,
    },

    /// Checked subtraction went below zero.
    #[error("arithmetic underflow in {op}")]
    Underflow {
        /// The operation that underflowed.
        op: &'static str,
    },

    /// A decimal fraction exceeded 1.0 or could not be parsed.
    #[error("invalid decimal fraction: {0}")]
    InvalidFraction(String),

    /// A token amount string could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// An address or identifier string could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A timestamp was out of range or malformed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Canonical serialization of a payload failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Error during canonical serialization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical payloads. Amounts must be
    /// strings or integers.
    #[error("float values are not permitted in canonical payloads: {0}")]
    FloatRejected(String),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),
}

impl From<serde_json::Error> for CanonicalizationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}
