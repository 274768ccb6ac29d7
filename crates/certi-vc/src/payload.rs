//! # Canonical Credential Payload
//!
//! The signed record binds a document fingerprint to its issuer, type and
//! validity window. Its byte encoding is:
//!
//! ```text
//! JCS({
//!   "document_hash": <64 hex>,
//!   "document_type": <string>,
//!   "expires_at":    <"YYYY-MM-DDTHH:MM:SSZ"> | null,
//!   "institution_id": <string>,
//!   "issued_at":     <"YYYY-MM-DDTHH:MM:SSZ">,
//!   "merkle_root":   <64 hex>,
//!   "schema":        "certitrust.credential.v1"
//! })
//! ```
//!
//! `expires_at` is always present, as `null` when absent, so that a payload
//! with no expiry cannot be confused with one whose expiry was stripped.
//! Hashes are lowercased before encoding.

use serde::{Deserialize, Serialize};

use certi_core::{is_sha256_hex, CanonicalBytes, InstitutionId, Timestamp};

use crate::error::VcError;

/// Schema tag embedded in every signed payload.
pub const PAYLOAD_SCHEMA: &str = "certitrust.credential.v1";

/// Maximum length of a document type label.
pub const MAX_DOCUMENT_TYPE_LEN: usize = 128;

/// The fields a credential signature covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    /// SHA-256 of the raw document bytes.
    pub document_hash: String,
    /// Merkle root over page hashes (equals `document_hash` for a blob).
    pub merkle_root: String,
    /// Issuing institution.
    pub institution_id: InstitutionId,
    /// Issuance instant.
    pub issued_at: Timestamp,
    /// Free-form credential type, e.g. `"diploma"` or `"transcript"`.
    pub document_type: String,
    /// Optional expiry instant.
    pub expires_at: Option<Timestamp>,
}

#[derive(Serialize)]
struct SignedFields<'a> {
    schema: &'static str,
    document_hash: String,
    merkle_root: String,
    institution_id: &'a str,
    issued_at: &'a Timestamp,
    document_type: &'a str,
    expires_at: Option<&'a Timestamp>,
}

impl CredentialPayload {
    /// Structural checks applied at issuance and when decoding tokens.
    pub fn validate(&self) -> Result<(), VcError> {
        for (name, value) in [
            ("document_hash", &self.document_hash),
            ("merkle_root", &self.merkle_root),
        ] {
            if !is_sha256_hex(&value.to_ascii_lowercase()) {
                return Err(VcError::InvalidPayload(format!(
                    "{name} must be 64 hex characters"
                )));
            }
        }
        if self.document_type.trim().is_empty() {
            return Err(VcError::InvalidPayload("document_type must not be empty".into()));
        }
        if self.document_type.len() > MAX_DOCUMENT_TYPE_LEN {
            return Err(VcError::InvalidPayload(format!(
                "document_type exceeds {MAX_DOCUMENT_TYPE_LEN} bytes"
            )));
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= self.issued_at {
                return Err(VcError::InvalidPayload(format!(
                    "expires_at {expires_at} is not after issued_at {}",
                    self.issued_at
                )));
            }
        }
        Ok(())
    }

    /// True once `now` has reached `expires_at`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Encode a payload to its canonical signable bytes.
pub fn build_payload(payload: &CredentialPayload) -> Result<CanonicalBytes, VcError> {
    let fields = SignedFields {
        schema: PAYLOAD_SCHEMA,
        document_hash: payload.document_hash.to_ascii_lowercase(),
        merkle_root: payload.merkle_root.to_ascii_lowercase(),
        institution_id: payload.institution_id.as_str(),
        issued_at: &payload.issued_at,
        document_type: &payload.document_type,
        expires_at: payload.expires_at.as_ref(),
    };
    Ok(CanonicalBytes::new(&fields)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CredentialPayload {
        CredentialPayload {
            document_hash: "ab".repeat(32),
            merkle_root: "cd".repeat(32),
            institution_id: InstitutionId::new("univ-lagos").unwrap(),
            issued_at: Timestamp::parse("2026-01-15T12:00:00Z").unwrap(),
            document_type: "diploma".into(),
            expires_at: None,
        }
    }

    #[test]
    fn exact_byte_layout() {
        let bytes = build_payload(&sample()).unwrap();
        let expected = format!(
            concat!(
                r#"{{"document_hash":"{}","document_type":"diploma","expires_at":null,"#,
                r#""institution_id":"univ-lagos","issued_at":"2026-01-15T12:00:00Z","#,
                r#""merkle_root":"{}","schema":"certitrust.credential.v1"}}"#
            ),
            "ab".repeat(32),
            "cd".repeat(32)
        );
        assert_eq!(bytes.as_str(), expected);
    }

    #[test]
    fn expiry_is_encoded_as_timestamp() {
        let mut p = sample();
        p.expires_at = Some(Timestamp::parse("2030-01-01T00:00:00Z").unwrap());
        let bytes = build_payload(&p).unwrap();
        assert!(bytes.as_str().contains(r#""expires_at":"2030-01-01T00:00:00Z""#));
    }

    #[test]
    fn uppercase_hashes_encode_identically() {
        let mut upper = sample();
        upper.document_hash = upper.document_hash.to_uppercase();
        assert_eq!(build_payload(&upper).unwrap(), build_payload(&sample()).unwrap());
    }

    #[test]
    fn every_field_changes_the_bytes() {
        let base = build_payload(&sample()).unwrap();
        let mut variants = Vec::new();

        let mut p = sample();
        p.document_hash = "ef".repeat(32);
        variants.push(p);
        let mut p = sample();
        p.merkle_root = "ef".repeat(32);
        variants.push(p);
        let mut p = sample();
        p.institution_id = InstitutionId::new("univ-ibadan").unwrap();
        variants.push(p);
        let mut p = sample();
        p.issued_at = p.issued_at.plus_secs(1);
        variants.push(p);
        let mut p = sample();
        p.document_type = "transcript".into();
        variants.push(p);
        let mut p = sample();
        p.expires_at = Some(p.issued_at.plus_secs(60));
        variants.push(p);

        for v in variants {
            assert_ne!(build_payload(&v).unwrap(), base, "{v:?}");
        }
    }

    #[test]
    fn validate_accepts_sample() {
        sample().validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_hash() {
        let mut p = sample();
        p.document_hash = "xyz".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_rejects_expiry_before_issuance() {
        let mut p = sample();
        p.expires_at = Some(p.issued_at);
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_type() {
        let mut p = sample();
        p.document_type = "  ".into();
        assert!(p.validate().is_err());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let mut p = sample();
        let expires = p.issued_at.plus_secs(10);
        p.expires_at = Some(expires);
        assert!(!p.is_expired_at(expires.plus_secs(-1)));
        assert!(p.is_expired_at(expires));
        assert!(!sample().is_expired_at(expires.plus_secs(1_000_000)));
    }
}
