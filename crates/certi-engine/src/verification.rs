//! # Verification State Machine
//!
//! A strictly ordered pipeline, terminal on the first failing stage:
//!
//! | # | Stage | Failure code |
//! |---|---|---|
//! | 1 | locate proof token | `QR_NOT_FOUND` |
//! | 2 | decode token | `QR_DECODE_FAIL` / `PAYLOAD_READ_FAIL` |
//! | 3 | re-fingerprint presented document | `HASH_MISMATCH` |
//! | 4 | resolve issuing institution | `INSTITUTION_NOT_FOUND` |
//! | 5 | credential status | `DOCUMENT_REVOKED` / `DOCUMENT_EXPIRED` |
//! | 6 | signature against key epochs, newest first | `SIGNATURE_MISMATCH` |
//! | 7 | | `SUCCESS` |
//!
//! Claim verification runs stages 4 to 7 over a bare claim.
//!
//! Stage 3 always compares the content hash. The page root is compared only
//! when both the presentation and the credential are paginated, so a
//! credential issued over a blob still verifies when the caller supplies
//! page ranges.
//!
//! Every outcome, including `INTERNAL_ERROR`, appends exactly one audit
//! entry before the result is returned. If that append fails the result is
//! downgraded to `INTERNAL_ERROR`. Collaborator faults never escape as
//! errors.
//!
//! Revocation is looked up by `(institution_id, document_hash)`: the
//! document id in a token is not covered by the signature, so it cannot be
//! trusted to select the record.

use std::ops::Range;
use std::sync::Arc;

use certi_audit::{AuditChain, AuditEventType, AuditRecord, ChainKey};
use certi_core::{digests_equal, ActorId, Clock, InstitutionId, Timestamp};
use certi_crypto::{find_tampered_pages, DocumentFingerprint};
use certi_vc::{build_payload, CredentialPayload, ProofToken, TokenDecodeError};

use crate::attestation::{consult, AttestationService};
use crate::error::StoreError;
use crate::result::{ErrorCode, VerificationResult};
use crate::store::{CredentialStore, InstitutionStore};

/// A presented document and the proof token found alongside it.
#[derive(Debug, Clone, Default)]
pub struct VerificationRequest<'a> {
    /// Token bytes; `None` when no token could be located.
    pub token: Option<&'a [u8]>,
    pub document: &'a [u8],
    /// Ordered page byte ranges within `document`. Empty for a blob.
    pub page_ranges: &'a [Range<usize>],
    /// Hash the caller expects the credential to commit to.
    pub expected_hash: Option<&'a str>,
    pub actor: Option<ActorId>,
}

/// A credential claim presented without document bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationClaim {
    pub document_hash: String,
    /// Base64 signature, as presented.
    pub signature: String,
    pub institution_id: InstitutionId,
    /// Defaults to `document_hash` (a non-paginated blob).
    pub merkle_root: Option<String>,
    pub issued_at: Timestamp,
    pub document_type: String,
    pub expires_at: Option<Timestamp>,
}

impl VerificationClaim {
    fn payload(&self) -> CredentialPayload {
        CredentialPayload {
            document_hash: self.document_hash.to_ascii_lowercase(),
            merkle_root: self
                .merkle_root
                .as_deref()
                .unwrap_or(&self.document_hash)
                .to_ascii_lowercase(),
            institution_id: self.institution_id.clone(),
            issued_at: self.issued_at,
            document_type: self.document_type.clone(),
            expires_at: self.expires_at,
        }
    }
}

impl From<&ProofToken> for VerificationClaim {
    fn from(token: &ProofToken) -> Self {
        Self {
            document_hash: token.document_hash.clone(),
            signature: token.signature.clone(),
            institution_id: token.institution_id.clone(),
            merkle_root: Some(token.merkle_root.clone()),
            issued_at: token.issued_at,
            document_type: token.document_type.clone(),
            expires_at: token.expires_at,
        }
    }
}

pub struct Verifier {
    institutions: Arc<dyn InstitutionStore>,
    credentials: Arc<dyn CredentialStore>,
    audit: Arc<AuditChain>,
    clock: Arc<dyn Clock>,
    attestation: Option<Arc<dyn AttestationService>>,
    fold_expired_into_revoked: bool,
}

impl Verifier {
    pub fn new(
        institutions: Arc<dyn InstitutionStore>,
        credentials: Arc<dyn CredentialStore>,
        audit: Arc<AuditChain>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            institutions,
            credentials,
            audit,
            clock,
            attestation: None,
            fold_expired_into_revoked: false,
        }
    }

    pub fn with_attestation(mut self, service: Arc<dyn AttestationService>) -> Self {
        self.attestation = Some(service);
        self
    }

    pub fn fold_expired_into_revoked(mut self, fold: bool) -> Self {
        self.fold_expired_into_revoked = fold;
        self
    }

    /// Verify a presented document against its proof token.
    pub fn verify_document(&self, request: VerificationRequest<'_>) -> VerificationResult {
        // Stages 1 and 2.
        let token = match ProofToken::decode(request.token) {
            Ok(token) => token,
            Err(err) => {
                let (code, message) = match &err {
                    TokenDecodeError::NotFound => {
                        (ErrorCode::QrNotFound, ErrorCode::QrNotFound.default_message().to_string())
                    }
                    TokenDecodeError::Malformed(_) => (ErrorCode::QrDecodeFail, err.to_string()),
                    TokenDecodeError::InvalidPayload(_) => {
                        (ErrorCode::PayloadReadFail, err.to_string())
                    }
                };
                let result = VerificationResult::with_code(code).conclude(code, message);
                return self.record(result, None, request.actor);
            }
        };

        let mut result = VerificationResult::with_code(ErrorCode::InternalError);
        result.document_id = Some(token.document_id);
        result.document_hash = Some(token.document_hash.clone());
        result.institution_id = Some(token.institution_id.clone());
        result.merkle_root = Some(token.merkle_root.clone());
        result.credential_type = Some(token.document_type.clone());
        result.expected_hash_matches = request
            .expected_hash
            .map(|expected| digests_equal(&token.document_hash, expected));

        let chain = self.chain_for(&token.institution_id);

        // Stage 3.
        let presented = if request.page_ranges.is_empty() {
            DocumentFingerprint::of_blob(request.document)
        } else {
            match DocumentFingerprint::with_page_ranges(request.document, request.page_ranges) {
                Ok(fp) => fp,
                Err(err) => {
                    tracing::error!(error = %err, "presented page ranges are invalid");
                    let result = result.conclude(
                        ErrorCode::InternalError,
                        format!("presented document could not be fingerprinted: {err}"),
                    );
                    return self.record(result, chain, request.actor);
                }
            }
        };

        // A blob credential commits to root == content hash, so only a
        // paginated credential has a page root to compare.
        let content_matches = digests_equal(&presented.content_hash, &token.document_hash);
        let issued_paginated = !digests_equal(&token.merkle_root, &token.document_hash);
        let root_matches = !presented.is_paginated()
            || !issued_paginated
            || digests_equal(&presented.merkle_root, &token.merkle_root);
        if !content_matches || !root_matches {
            if presented.is_paginated() {
                result.tampered_pages = self.localize_tampering(&token, &presented);
            }
            let message = if result.tampered_pages.is_empty() {
                ErrorCode::HashMismatch.default_message().to_string()
            } else {
                format!(
                    "{} (pages {:?} differ)",
                    ErrorCode::HashMismatch.default_message(),
                    result.tampered_pages
                )
            };
            let result = result.conclude(ErrorCode::HashMismatch, message);
            return self.record(result, chain, request.actor);
        }

        // Stages 4 to 7.
        let result = self.check_credential(result, &VerificationClaim::from(&token));
        self.record(result, chain, request.actor)
    }

    /// Verify a claim without document bytes.
    pub fn verify_claim(&self, claim: &VerificationClaim, actor: Option<ActorId>) -> VerificationResult {
        let mut result = VerificationResult::with_code(ErrorCode::InternalError);
        result.document_hash = Some(claim.document_hash.to_ascii_lowercase());
        result.institution_id = Some(claim.institution_id.clone());
        result.merkle_root = Some(claim.payload().merkle_root);
        result.credential_type = Some(claim.document_type.clone());

        let chain = self.chain_for(&claim.institution_id);
        let result = self.check_credential(result, claim);
        self.record(result, chain, actor)
    }

    /// Stages 4 to 7.
    fn check_credential(
        &self,
        result: VerificationResult,
        claim: &VerificationClaim,
    ) -> VerificationResult {
        match self.try_check_credential(result.clone(), claim) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    institution = %claim.institution_id,
                    error = %err,
                    "store fault during verification"
                );
                result.conclude(
                    ErrorCode::InternalError,
                    format!("{}: {err}", ErrorCode::InternalError.default_message()),
                )
            }
        }
    }

    fn try_check_credential(
        &self,
        mut result: VerificationResult,
        claim: &VerificationClaim,
    ) -> Result<VerificationResult, StoreError> {
        let payload = claim.payload();

        // Stage 4.
        let institution = match self.institutions.get(&claim.institution_id)? {
            Some(institution) if institution.is_active => institution,
            _ => return Ok(result.conclude(
                ErrorCode::InstitutionNotFound,
                ErrorCode::InstitutionNotFound.default_message(),
            )),
        };

        // Stage 5.
        let records = self
            .credentials
            .find_by_hash(&claim.institution_id, &payload.document_hash)?;
        if records.iter().any(|r| r.is_revoked()) {
            return Ok(result.conclude(
                ErrorCode::DocumentRevoked,
                ErrorCode::DocumentRevoked.default_message(),
            ));
        }
        if payload.is_expired_at(self.clock.now()) {
            let code = if self.fold_expired_into_revoked {
                ErrorCode::DocumentRevoked
            } else {
                ErrorCode::DocumentExpired
            };
            return Ok(result.conclude(code, ErrorCode::DocumentExpired.default_message()));
        }

        // Stage 6.
        let bytes = match build_payload(&payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(error = %err, "claimed payload could not be canonicalized");
                return Ok(result.conclude(ErrorCode::InternalError, err.to_string()));
            }
        };
        let verified_epoch = institution
            .key_ring
            .verification_candidates(payload.issued_at)
            .find(|epoch| certi_vc::verify(&bytes, &claim.signature, &epoch.public_key))
            .map(|epoch| epoch.epoch);

        let Some(epoch) = verified_epoch else {
            return Ok(result.conclude(
                ErrorCode::SignatureMismatch,
                ErrorCode::SignatureMismatch.default_message(),
            ));
        };

        // Stage 7.
        result.key_epoch = Some(epoch);
        if let Some(service) = &self.attestation {
            result.attestation = Some(consult(
                service.as_ref(),
                &payload.document_hash,
                &claim.institution_id,
            ));
        }
        Ok(result.conclude(ErrorCode::Success, ErrorCode::Success.default_message()))
    }

    /// Issued page hashes of the credential named by the token, compared with
    /// the presented pages.
    fn localize_tampering(&self, token: &ProofToken, presented: &DocumentFingerprint) -> Vec<usize> {
        match self.credentials.get(&token.document_id) {
            Ok(Some(record))
                if record.institution_id == token.institution_id
                    && digests_equal(&record.document_hash, &token.document_hash)
                    && !record.page_hashes.is_empty() =>
            {
                find_tampered_pages(&record.page_hashes, &presented.page_hashes)
            }
            Ok(_) => Vec::new(),
            Err(err) => {
                tracing::error!(error = %err, "credential lookup failed during tamper localization");
                Vec::new()
            }
        }
    }

    /// The institution's chain when it is known, else the global chain.
    fn chain_for(&self, institution_id: &InstitutionId) -> ChainKey {
        match self.institutions.get(institution_id) {
            Ok(Some(_)) => Some(institution_id.clone()),
            Ok(None) => None,
            Err(err) => {
                tracing::error!(error = %err, "institution lookup failed while routing audit entry");
                None
            }
        }
    }

    /// Append the outcome to the audit trail.
    fn record(
        &self,
        mut result: VerificationResult,
        chain: ChainKey,
        actor: Option<ActorId>,
    ) -> VerificationResult {
        let event = if result.valid {
            AuditEventType::VerificationSuccess
        } else {
            AuditEventType::VerificationFailed
        };

        let mut metadata = serde_json::json!({ "error_code": result.error_code.as_str() });
        if let Some(id) = &result.document_id {
            metadata["document_id"] = id.to_string().into();
        }
        if let Some(epoch) = result.key_epoch {
            metadata["key_epoch"] = epoch.into();
        }
        if chain.is_none() {
            if let Some(id) = &result.institution_id {
                metadata["claimed_institution_id"] = id.to_string().into();
            }
        }

        let mut record = AuditRecord::new(event).actor(actor).metadata(metadata);
        record.institution_id = chain;
        record.document_hash = result.document_hash.clone();

        match self.audit.append(record) {
            Ok(entry) => {
                result.audit_position = Some(entry.chain_position);
                if result.valid {
                    tracing::info!(
                        institution = ?result.institution_id.as_ref().map(|i| i.to_string()),
                        key_epoch = ?result.key_epoch,
                        "verification succeeded"
                    );
                } else {
                    tracing::warn!(
                        code = %result.error_code,
                        institution = ?result.institution_id.as_ref().map(|i| i.to_string()),
                        "verification failed"
                    );
                }
                result
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    code = %result.error_code,
                    "verification outcome could not be audited"
                );
                result.key_epoch = None;
                result.attestation = None;
                result.conclude(
                    ErrorCode::InternalError,
                    format!("verification outcome could not be recorded: {err}"),
                )
            }
        }
    }
}
