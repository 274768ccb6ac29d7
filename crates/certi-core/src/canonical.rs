//! # Canonical Serialization
//!
//! `CanonicalBytes` is the only byte sequence that CertiTrust ever signs or
//! hashes as a structured record: credential payloads, audit log entries and
//! any future signed artifact.
//!
//! ## Security Invariant
//!
//! The inner buffer is private and the sole constructor is
//! [`CanonicalBytes::new()`]. Issuance and verification both call it, so the
//! signed bytes are reproduced bit-for-bit at check time. A second encoder
//! anywhere in the workspace would turn every future signature into a silent
//! verification failure.
//!
//! ## Encoding Rules
//!
//! 1. **Reject floats.** Numbers must be integers. Float formatting is the
//!    classic source of cross-implementation divergence.
//! 2. **Timestamps** are carried as strings produced by
//!    [`Timestamp`](crate::Timestamp) (`YYYY-MM-DDTHH:MM:SSZ`).
//! 3. **RFC 8785 (JCS)** serialization via `serde_jcs`: sorted keys, compact
//!    separators, UTF-8 output, no trailing whitespace.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with float rejection.
///
/// # Invariants
///
/// - Object keys are sorted, separators are compact.
/// - No float appears anywhere in the encoded value.
/// - The bytes are valid UTF-8 JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::FloatRejected`] if the value contains
    /// a non-integer number, or [`CanonicalizationError::SerializationFailed`]
    /// if serde cannot represent the value as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let text = serde_jcs::to_string(&value)?;
        Ok(Self(text.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the canonical bytes as text. Always succeeds: JCS output is UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk the value tree and fail on the first float.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return Ok(());
            }
            Err(CanonicalizationError::FloatRejected(
                n.as_f64().unwrap_or(f64::NAN),
            ))
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}
