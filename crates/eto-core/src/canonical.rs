//! # Canonical Payload Bytes
//!
//! A resolution promise is a hash over the call a legal representative
//! asked for. Two requests for the same call must hash the same, so every
//! hashed payload is first turned into [`CanonicalBytes`]: RFC 8785 (JCS)
//! JSON with lexicographically ordered keys and no insignificant
//! whitespace.
//!
//! Floats are refused outright. Amounts travel as decimal strings and
//! timestamps as integers, so a float in a payload is always a bug.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// JCS-encoded bytes of a payload that contains no floats.
///
/// The buffer is private; [`CanonicalBytes::new`] is the only way to get one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Encode `payload` canonically.
    ///
    /// # Errors
    ///
    /// [`CanonicalizationError::FloatRejected`] names the first float found;
    /// [`CanonicalizationError::SerializationFailed`] covers payloads serde
    /// cannot turn into JSON (e.g. maps with non-string keys).
    pub fn new(payload: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let tree = serde_json::to_value(payload)?;
        ensure_integral(&tree)?;
        Ok(Self(serde_jcs::to_vec(&tree)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk the tree and fail on the first non-integral number.
fn ensure_integral(node: &Value) -> Result<(), CanonicalizationError> {
    match node {
        Value::Number(n) if n.is_f64() => Err(CanonicalizationError::FloatRejected(n.to_string())),
        Value::Array(items) => items.iter().try_for_each(ensure_integral),
        Value::Object(fields) => fields.values().try_for_each(ensure_integral),
        _ => Ok(()),
    }
}
