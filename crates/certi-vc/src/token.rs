//! # Proof Token Codec
//!
//! The proof token is the compact JSON embedded alongside a document (in a
//! QR code, a PDF attachment, an HTTP header). It carries every field needed
//! to rebuild the signed payload, plus the signature.
//!
//! ## Wire Format
//!
//! ```json
//! {
//!   "@context": "https://www.w3.org/ns/credentials/v2",
//!   "type": ["VerifiablePresentation", "<document_type>"],
//!   "id": "urn:certitrust:<document_id>",
//!   "holder": "did:certitrust:<institution_id>",
//!   "issuanceDate": "2026-01-15T12:00:00Z",
//!   "expirationDate": "2030-01-15T12:00:00Z",
//!   "proof": {
//!     "type": "Ed25519Signature2020",
//!     "verificationMethod": "did:certitrust:<institution_id>#signing-key",
//!     "proofValue": "<base64 signature>",
//!     "documentHash": "<64 hex>",
//!     "merkleRoot": "<64 hex>"
//!   }
//! }
//! ```
//!
//! `expirationDate` is omitted when the credential does not expire. `holder`
//! may also be an object `{"id": "did:certitrust:..."}`.
//!
//! ## Decoding Outcomes
//!
//! Decoding distinguishes three failures, mapped by the verifier to distinct
//! error codes: no token at all, a container that is not JSON, and JSON that
//! does not describe a valid credential.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use certi_core::{is_sha256_hex, DocumentId, InstitutionId, Timestamp};

use crate::error::VcError;
use crate::payload::CredentialPayload;

/// JSON-LD context of the envelope.
pub const TOKEN_CONTEXT: &str = "https://www.w3.org/ns/credentials/v2";
/// First entry of the envelope `type` array.
pub const PRESENTATION_TYPE: &str = "VerifiablePresentation";
/// Proof type label.
pub const PROOF_TYPE: &str = "Ed25519Signature2020";
/// Prefix of the envelope `id`.
pub const DOCUMENT_URN_PREFIX: &str = "urn:certitrust:";
/// Prefix of the issuer DID.
pub const ISSUER_DID_PREFIX: &str = "did:certitrust:";

/// Why a token could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    /// No token bytes were presented.
    #[error("no proof token present")]
    NotFound,

    /// The bytes are not a JSON document.
    #[error("proof token is not valid JSON: {0}")]
    Malformed(String),

    /// The JSON does not describe a valid credential.
    #[error("proof token payload is invalid: {0}")]
    InvalidPayload(String),
}

/// A decoded proof token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofToken {
    /// Issuer-assigned credential identifier.
    pub document_id: DocumentId,
    /// Committed SHA-256 of the document.
    pub document_hash: String,
    /// Issuing institution.
    pub institution_id: InstitutionId,
    /// Base64 Ed25519 signature. Kept as presented: a malformed signature is
    /// a verification failure, not a decoding failure.
    pub signature: String,
    /// Committed Merkle root.
    pub merkle_root: String,
    /// Issuance instant.
    pub issued_at: Timestamp,
    /// Credential type.
    pub document_type: String,
    /// Optional expiry.
    pub expires_at: Option<Timestamp>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "@context")]
    context: String,
    #[serde(rename = "type")]
    types: Vec<String>,
    id: String,
    holder: Holder,
    #[serde(rename = "issuanceDate")]
    issuance_date: String,
    #[serde(rename = "expirationDate", default, skip_serializing_if = "Option::is_none")]
    expiration_date: Option<String>,
    proof: EnvelopeProof,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Holder {
    Did(String),
    Object { id: String },
}

impl Holder {
    fn did(&self) -> &str {
        match self {
            Holder::Did(did) | Holder::Object { id: did } => did,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct EnvelopeProof {
    #[serde(rename = "type")]
    proof_type: String,
    #[serde(rename = "verificationMethod")]
    verification_method: String,
    #[serde(rename = "proofValue")]
    proof_value: String,
    #[serde(rename = "documentHash")]
    document_hash: String,
    #[serde(rename = "merkleRoot")]
    merkle_root: String,
}

impl ProofToken {
    /// The signed payload this token claims.
    pub fn payload(&self) -> CredentialPayload {
        CredentialPayload {
            document_hash: self.document_hash.clone(),
            merkle_root: self.merkle_root.clone(),
            institution_id: self.institution_id.clone(),
            issued_at: self.issued_at,
            document_type: self.document_type.clone(),
            expires_at: self.expires_at,
        }
    }

    /// Serialize to compact envelope JSON.
    pub fn encode(&self) -> Result<String, VcError> {
        let did = format!("{ISSUER_DID_PREFIX}{}", self.institution_id);
        let envelope = Envelope {
            context: TOKEN_CONTEXT.into(),
            types: vec![PRESENTATION_TYPE.into(), self.document_type.clone()],
            id: format!("{DOCUMENT_URN_PREFIX}{}", self.document_id),
            issuance_date: self.issued_at.to_iso8601(),
            expiration_date: self.expires_at.map(|t| t.to_iso8601()),
            proof: EnvelopeProof {
                proof_type: PROOF_TYPE.into(),
                verification_method: format!("{did}#signing-key"),
                proof_value: self.signature.clone(),
                document_hash: self.document_hash.clone(),
                merkle_root: self.merkle_root.clone(),
            },
            holder: Holder::Did(did),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode token bytes. `None` or blank input means no token was found.
    pub fn decode(bytes: Option<&[u8]>) -> Result<Self, TokenDecodeError> {
        let bytes = match bytes {
            Some(b) if !b.iter().all(u8::is_ascii_whitespace) => b,
            _ => return Err(TokenDecodeError::NotFound),
        };

        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| TokenDecodeError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(TokenDecodeError::Malformed(
                "top-level value is not an object".into(),
            ));
        }
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| TokenDecodeError::InvalidPayload(e.to_string()))?;
        Self::from_envelope(envelope).map_err(TokenDecodeError::InvalidPayload)
    }

    fn from_envelope(env: Envelope) -> Result<Self, String> {
        if env.context != TOKEN_CONTEXT {
            return Err(format!("unsupported @context {:?}", env.context));
        }
        if env.proof.proof_type != PROOF_TYPE {
            return Err(format!("unsupported proof type {:?}", env.proof.proof_type));
        }
        let document_type = match env.types.as_slice() {
            [presentation, document_type] if presentation == PRESENTATION_TYPE => {
                document_type.clone()
            }
            [presentation] if presentation == PRESENTATION_TYPE => {
                return Err("missing credential type".into())
            }
            _ => {
                return Err(format!(
                    "type must be [{PRESENTATION_TYPE:?}, <credential type>]"
                ))
            }
        };

        let document_id = env
            .id
            .strip_prefix(DOCUMENT_URN_PREFIX)
            .ok_or_else(|| format!("id must start with {DOCUMENT_URN_PREFIX:?}"))?
            .parse::<DocumentId>()
            .map_err(|e| e.to_string())?;

        let institution_id = env
            .holder
            .did()
            .strip_prefix(ISSUER_DID_PREFIX)
            .ok_or_else(|| format!("holder must start with {ISSUER_DID_PREFIX:?}"))?
            .parse::<InstitutionId>()
            .map_err(|e| e.to_string())?;

        let issued_at = Timestamp::parse(&env.issuance_date).map_err(|e| e.to_string())?;
        let expires_at = env
            .expiration_date
            .as_deref()
            .map(Timestamp::parse)
            .transpose()
            .map_err(|e| e.to_string())?;

        let document_hash = env.proof.document_hash.to_ascii_lowercase();
        let merkle_root = env.proof.merkle_root.to_ascii_lowercase();
        if !is_sha256_hex(&document_hash) {
            return Err("documentHash must be 64 hex characters".into());
        }
        if !is_sha256_hex(&merkle_root) {
            return Err("merkleRoot must be 64 hex characters".into());
        }
        if env.proof.proof_value.is_empty() {
            return Err("proofValue is empty".into());
        }

        let token = Self {
            document_id,
            document_hash,
            institution_id,
            signature: env.proof.proof_value,
            merkle_root,
            issued_at,
            document_type,
            expires_at,
        };
        token.payload().validate().map_err(|e| e.to_string())?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> ProofToken {
        ProofToken {
            document_id: DocumentId::new(),
            document_hash: "a1".repeat(32),
            institution_id: InstitutionId::new("poly-kano").unwrap(),
            signature: "c2lnbmF0dXJl".into(),
            merkle_root: "b2".repeat(32),
            issued_at: Timestamp::parse("2026-05-05T10:00:00Z").unwrap(),
            document_type: "transcript".into(),
            expires_at: Some(Timestamp::parse("2031-05-05T10:00:00Z").unwrap()),
        }
    }

    fn decode_str(s: &str) -> Result<ProofToken, TokenDecodeError> {
        ProofToken::decode(Some(s.as_bytes()))
    }

    #[test]
    fn encode_then_decode() {
        let t = token();
        let encoded = t.encode().unwrap();
        assert_eq!(decode_str(&encoded).unwrap(), t);
    }

    #[test]
    fn envelope_shape() {
        let t = token();
        let v: serde_json::Value = serde_json::from_str(&t.encode().unwrap()).unwrap();
        assert_eq!(v["@context"], TOKEN_CONTEXT);
        assert_eq!(v["type"][0], "VerifiablePresentation");
        assert_eq!(v["type"][1], "transcript");
        assert_eq!(v["id"], format!("urn:certitrust:{}", t.document_id));
        assert_eq!(v["holder"], "did:certitrust:poly-kano");
        assert_eq!(v["proof"]["verificationMethod"], "did:certitrust:poly-kano#signing-key");
        assert_eq!(v["proof"]["proofValue"], "c2lnbmF0dXJl");
    }

    #[test]
    fn no_expiry_omits_expiration_date() {
        let mut t = token();
        t.expires_at = None;
        let encoded = t.encode().unwrap();
        assert!(!encoded.contains("expirationDate"));
        assert_eq!(decode_str(&encoded).unwrap().expires_at, None);
    }

    #[test]
    fn missing_and_blank_input_is_not_found() {
        assert_eq!(ProofToken::decode(None), Err(TokenDecodeError::NotFound));
        assert_eq!(ProofToken::decode(Some(b"")), Err(TokenDecodeError::NotFound));
        assert_eq!(ProofToken::decode(Some(b" \n\t")), Err(TokenDecodeError::NotFound));
    }

    #[test]
    fn corrupt_container_is_malformed() {
        assert!(matches!(decode_str("{not json"), Err(TokenDecodeError::Malformed(_))));
        assert!(matches!(
            ProofToken::decode(Some(&[0xff, 0xfe, 0x00])),
            Err(TokenDecodeError::Malformed(_))
        ));
        assert!(matches!(decode_str("[1,2,3]"), Err(TokenDecodeError::Malformed(_))));
    }

    #[test]
    fn wrong_schema_is_invalid_payload() {
        assert!(matches!(decode_str("{}"), Err(TokenDecodeError::InvalidPayload(_))));
        assert!(matches!(
            decode_str(r#"{"document_hash":"aa"}"#),
            Err(TokenDecodeError::InvalidPayload(_))
        ));
    }

    #[test]
    fn bad_field_values_are_invalid_payload() {
        let encoded = token().encode().unwrap();
        let mutations: Vec<Box<dyn Fn(&mut serde_json::Value)>> = vec![
            Box::new(|v| v["proof"]["documentHash"] = "short".into()),
            Box::new(|v| v["proof"]["merkleRoot"] = "zz".repeat(32).into()),
            Box::new(|v| v["proof"]["proofValue"] = "".into()),
            Box::new(|v| v["proof"]["type"] = "RsaSignature2018".into()),
            Box::new(|v| v["id"] = "urn:other:123".into()),
            Box::new(|v| v["id"] = "urn:certitrust:not-a-uuid".into()),
            Box::new(|v| v["holder"] = "did:web:example.org".into()),
            Box::new(|v| v["issuanceDate"] = "2026-05-05T10:00:00+01:00".into()),
            Box::new(|v| v["issuanceDate"] = "2026-05-05T10:00:00.9Z".into()),
            Box::new(|v| v["type"] = serde_json::json!(["VerifiablePresentation"])),
            Box::new(|v| v["@context"] = "https://example.org".into()),
            Box::new(|v| v["expirationDate"] = "2020-01-01T00:00:00Z".into()),
        ];
        for (i, mutate) in mutations.iter().enumerate() {
            let mut v: serde_json::Value = serde_json::from_str(&encoded).unwrap();
            mutate(&mut v);
            let result = decode_str(&v.to_string());
            assert!(
                matches!(result, Err(TokenDecodeError::InvalidPayload(_))),
                "mutation {i}: {result:?}"
            );
        }
    }

    #[test]
    fn credential_type_is_read_by_position() {
        let mut t = token();
        t.document_type = PRESENTATION_TYPE.into();
        assert_eq!(decode_str(&t.encode().unwrap()).unwrap(), t);

        let mut v: serde_json::Value = serde_json::from_str(&token().encode().unwrap()).unwrap();
        v["type"] = serde_json::json!(["VerifiablePresentation", "transcript", "extra"]);
        assert!(matches!(decode_str(&v.to_string()), Err(TokenDecodeError::InvalidPayload(_))));
        v["type"] = serde_json::json!(["transcript", "VerifiablePresentation"]);
        assert!(matches!(decode_str(&v.to_string()), Err(TokenDecodeError::InvalidPayload(_))));
    }

    #[test]
    fn holder_object_form_is_accepted() {
        let t = token();
        let mut v: serde_json::Value = serde_json::from_str(&t.encode().unwrap()).unwrap();
        v["holder"] = serde_json::json!({"id": "did:certitrust:poly-kano", "name": "Kano Poly"});
        assert_eq!(decode_str(&v.to_string()).unwrap().institution_id, t.institution_id);
    }

    #[test]
    fn uppercase_hashes_are_normalized() {
        let t = token();
        let mut v: serde_json::Value = serde_json::from_str(&t.encode().unwrap()).unwrap();
        v["proof"]["documentHash"] = t.document_hash.to_uppercase().into();
        assert_eq!(decode_str(&v.to_string()).unwrap().document_hash, t.document_hash);
    }

    #[test]
    fn malformed_signature_still_decodes() {
        let mut t = token();
        t.signature = "invalid_signature".into();
        assert_eq!(decode_str(&t.encode().unwrap()).unwrap().signature, "invalid_signature");
    }

    #[test]
    fn payload_mirrors_token_fields() {
        let t = token();
        let p = t.payload();
        assert_eq!(p.document_hash, t.document_hash);
        assert_eq!(p.merkle_root, t.merkle_root);
        assert_eq!(p.institution_id, t.institution_id);
        assert_eq!(p.expires_at, t.expires_at);
    }
}
