//! Issuer-side record of an issued credential.
//!
//! The record is what the issuing institution keeps; the holder only ever
//! sees the [`ProofToken`]. Revocation mutates the record, never the token.

use serde::{Deserialize, Serialize};

use certi_core::{DocumentId, InstitutionId, Timestamp};
use certi_crypto::Ed25519Signature;

use crate::payload::CredentialPayload;
use crate::token::ProofToken;

/// Lifecycle state of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Revoked,
    Expired,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential as stored by its issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub document_id: DocumentId,
    pub institution_id: InstitutionId,
    pub document_hash: String,
    pub merkle_root: String,
    /// Page hashes at issuance, used to localize tampering.
    #[serde(default)]
    pub page_hashes: Vec<String>,
    pub document_type: String,
    pub issued_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    /// Key epoch that signed the credential.
    pub key_epoch: u32,
    pub signature: Ed25519Signature,
    #[serde(default)]
    pub revoked_at: Option<Timestamp>,
    #[serde(default)]
    pub revocation_reason: Option<String>,
}

impl CredentialRecord {
    /// True once the issuer has revoked the credential.
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Status at `now`. Revocation wins over expiry.
    pub fn effective_status(&self, now: Timestamp) -> CredentialStatus {
        if self.is_revoked() {
            CredentialStatus::Revoked
        } else if self.payload().is_expired_at(now) {
            CredentialStatus::Expired
        } else {
            CredentialStatus::Active
        }
    }

    /// Mark revoked. Returns `false` if it already was.
    pub fn revoke(&mut self, at: Timestamp, reason: Option<String>) -> bool {
        if self.is_revoked() {
            return false;
        }
        self.revoked_at = Some(at);
        self.revocation_reason = reason;
        true
    }

    /// The signed payload of this credential.
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

    /// The proof token handed to the holder.
    pub fn to_token(&self) -> ProofToken {
        ProofToken {
            document_id: self.document_id,
            document_hash: self.document_hash.clone(),
            institution_id: self.institution_id.clone(),
            signature: self.signature.to_base64(),
            merkle_root: self.merkle_root.clone(),
            issued_at: self.issued_at,
            document_type: self.document_type.clone(),
            expires_at: self.expires_at,
        }
    }
}
