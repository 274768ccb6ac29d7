//! # Verification Result
//!
//! The stable, serializable outcome of a verification. Field names and
//! error code spellings are part of the external contract.

use serde::{Deserialize, Serialize};

use certi_core::{DocumentId, InstitutionId};

use crate::attestation::AttestationReport;

/// Outcome codes, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    QrNotFound,
    QrDecodeFail,
    PayloadReadFail,
    HashMismatch,
    InstitutionNotFound,
    DocumentRevoked,
    DocumentExpired,
    SignatureMismatch,
    InternalError,
    Success,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QrNotFound => "QR_NOT_FOUND",
            Self::QrDecodeFail => "QR_DECODE_FAIL",
            Self::PayloadReadFail => "PAYLOAD_READ_FAIL",
            Self::HashMismatch => "HASH_MISMATCH",
            Self::InstitutionNotFound => "INSTITUTION_NOT_FOUND",
            Self::DocumentRevoked => "DOCUMENT_REVOKED",
            Self::DocumentExpired => "DOCUMENT_EXPIRED",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Success => "SUCCESS",
        }
    }

    /// Default human-readable message.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::QrNotFound => "No proof token found. Is this a CertiTrust credential?",
            Self::QrDecodeFail => "Proof token could not be decoded",
            Self::PayloadReadFail => "Proof token payload is invalid",
            Self::HashMismatch => "Document does not match the fingerprint in its proof token",
            Self::InstitutionNotFound => "Issuing institution is unknown or deactivated",
            Self::DocumentRevoked => "Credential has been revoked by its issuer",
            Self::DocumentExpired => "Credential has expired",
            Self::SignatureMismatch => "Signature does not match any key of the issuing institution",
            Self::InternalError => "Verification could not be completed",
            Self::Success => "Document signature verified successfully",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured verification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub error_code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<InstitutionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    /// Key epoch whose public key verified the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_epoch: Option<u32>,
    /// 1-based pages that differ from the issued document.
    #[serde(default)]
    pub tampered_pages: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<AttestationReport>,
    /// Position of the audit entry recording this outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_position: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_hash_matches: Option<bool>,
}

impl VerificationResult {
    /// A result carrying `code` and its default message.
    pub fn with_code(code: ErrorCode) -> Self {
        Self {
            valid: code == ErrorCode::Success,
            error_code: code,
            message: code.default_message().to_string(),
            document_id: None,
            document_hash: None,
            institution_id: None,
            merkle_root: None,
            credential_type: None,
            key_epoch: None,
            tampered_pages: Vec::new(),
            attestation: None,
            audit_position: None,
            expected_hash_matches: None,
        }
    }

    /// Replace the outcome, keeping the credential details gathered so far.
    pub(crate) fn conclude(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
        self.valid = code == ErrorCode::Success;
        self.error_code = code;
        self.message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_screaming_snake() {
        let all = [
            ErrorCode::QrNotFound,
            ErrorCode::QrDecodeFail,
            ErrorCode::PayloadReadFail,
            ErrorCode::HashMismatch,
            ErrorCode::InstitutionNotFound,
            ErrorCode::DocumentRevoked,
            ErrorCode::DocumentExpired,
            ErrorCode::SignatureMismatch,
            ErrorCode::InternalError,
            ErrorCode::Success,
        ];
        for code in all {
            assert_eq!(serde_json::to_string(&code).unwrap(), format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn only_success_is_valid() {
        assert!(VerificationResult::with_code(ErrorCode::Success).valid);
        assert!(!VerificationResult::with_code(ErrorCode::HashMismatch).valid);
        let r = VerificationResult::with_code(ErrorCode::Success)
            .conclude(ErrorCode::InternalError, "audit down");
        assert!(!r.valid);
        assert_eq!(r.message, "audit down");
    }

    #[test]
    fn absent_fields_are_omitted() {
        let json = serde_json::to_value(VerificationResult::with_code(ErrorCode::QrNotFound)).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj["valid"], false);
        assert_eq!(obj["error_code"], "QR_NOT_FOUND");
        assert_eq!(obj["tampered_pages"], serde_json::json!([]));
        assert!(!obj.contains_key("document_hash"));
        assert!(!obj.contains_key("key_epoch"));
    }
}
