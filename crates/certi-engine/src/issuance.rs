//! # Credential Issuance
//!
//! ```text
//! fingerprint document (and pages)
//!   -> build canonical payload
//!   -> sign with the institution's current key epoch (through custody)
//!   -> store the credential record
//!   -> append `document_issued`
//! ```
//!
//! A custody failure aborts before anything is stored or audited. If the
//! `document_issued` append fails, the stored record is removed again and
//! the caller gets the audit error: no credential exists without its
//! issuance entry. The caller is responsible for holding the institution's rotation gate so the
//! current epoch cannot change between snapshot and signing.

use std::ops::Range;
use std::sync::Arc;

use certi_audit::{AuditChain, AuditError, AuditEventType, AuditLogEntry, AuditRecord};
use certi_core::{ActorId, Clock, DocumentId, InstitutionId, Timestamp};
use certi_crypto::{DocumentFingerprint, KeyCustody};
use certi_vc::{build_payload, sign_with_custody, CredentialPayload, CredentialRecord, ProofToken};

use crate::error::{IssuanceError, StoreError};
use crate::store::{CredentialStore, InstitutionStore};

/// Append `record` to the audit chain. On failure, run `rollback` to undo the
/// store mutation the entry was describing, then return the append error.
pub(crate) fn append_or_rollback(
    audit: &AuditChain,
    record: AuditRecord,
    rollback: impl FnOnce() -> Result<(), StoreError>,
) -> Result<AuditLogEntry, AuditError> {
    audit.append(record).map_err(|err| {
        tracing::warn!(error = %err, "audit append failed, rolling back");
        if let Err(rollback_err) = rollback() {
            tracing::error!(error = %rollback_err, "rollback after failed audit append did not complete");
        }
        err
    })
}

/// What to issue.
#[derive(Debug, Clone)]
pub struct IssuanceRequest<'a> {
    pub institution_id: &'a InstitutionId,
    pub document: &'a [u8],
    /// Ordered page byte ranges within `document`. Empty for a blob.
    pub page_ranges: &'a [Range<usize>],
    pub document_type: &'a str,
    pub expires_at: Option<Timestamp>,
    pub actor: Option<ActorId>,
}

/// A freshly issued credential.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub record: CredentialRecord,
    pub token: ProofToken,
    /// `token`, encoded for embedding.
    pub encoded_token: String,
    pub audit_entry: AuditLogEntry,
}

pub struct Issuer {
    institutions: Arc<dyn InstitutionStore>,
    credentials: Arc<dyn CredentialStore>,
    audit: Arc<AuditChain>,
    custody: Arc<dyn KeyCustody>,
    clock: Arc<dyn Clock>,
}

impl Issuer {
    pub fn new(
        institutions: Arc<dyn InstitutionStore>,
        credentials: Arc<dyn CredentialStore>,
        audit: Arc<AuditChain>,
        custody: Arc<dyn KeyCustody>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            institutions,
            credentials,
            audit,
            custody,
            clock,
        }
    }

    pub fn issue(&self, request: IssuanceRequest<'_>) -> Result<IssuedCredential, IssuanceError> {
        let institution = self
            .institutions
            .get(request.institution_id)?
            .ok_or_else(|| IssuanceError::InstitutionNotFound(request.institution_id.clone()))?;
        if !institution.is_active {
            return Err(IssuanceError::InstitutionInactive(institution.institution_id));
        }

        let fingerprint = if request.page_ranges.is_empty() {
            DocumentFingerprint::of_blob(request.document)
        } else {
            DocumentFingerprint::with_page_ranges(request.document, request.page_ranges)?
        };

        let payload = CredentialPayload {
            document_hash: fingerprint.content_hash.clone(),
            merkle_root: fingerprint.merkle_root.clone(),
            institution_id: institution.institution_id.clone(),
            issued_at: self.clock.now(),
            document_type: request.document_type.trim().to_string(),
            expires_at: request.expires_at,
        };
        payload.validate()?;
        let bytes = build_payload(&payload)?;

        let epoch = institution.key_ring.current();
        let signature = sign_with_custody(self.custody.as_ref(), epoch, &bytes)?;

        let record = CredentialRecord {
            document_id: DocumentId::new(),
            institution_id: payload.institution_id,
            document_hash: payload.document_hash,
            merkle_root: payload.merkle_root,
            page_hashes: fingerprint.page_hashes,
            document_type: payload.document_type,
            issued_at: payload.issued_at,
            expires_at: payload.expires_at,
            key_epoch: epoch.epoch,
            signature,
            revoked_at: None,
            revocation_reason: None,
        };
        self.credentials.insert(record.clone())?;

        let audit_entry = append_or_rollback(
            &self.audit,
            AuditRecord::new(AuditEventType::DocumentIssued)
                .institution(record.institution_id.clone())
                .document_hash(record.document_hash.clone())
                .actor(request.actor)
                .metadata(serde_json::json!({
                    "document_id": record.document_id.to_string(),
                    "document_type": record.document_type,
                    "key_epoch": record.key_epoch,
                    "page_count": record.page_hashes.len(),
                })),
            || self.credentials.remove(&record.document_id).map(drop),
        )?;

        let token = record.to_token();
        let encoded_token = token.encode()?;

        tracing::info!(
            institution = %record.institution_id,
            document_id = %record.document_id,
            key_epoch = record.key_epoch,
            pages = record.page_hashes.len(),
            "credential issued"
        );

        Ok(IssuedCredential {
            record,
            token,
            encoded_token,
            audit_entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryCredentialStore, InMemoryInstitutionStore, InstitutionRecord};
    use certi_audit::{AuditStore, ChainKey, InMemoryAuditStore};
    use certi_core::ManualClock;
    use certi_crypto::{
        fingerprint, Ed25519PublicKey, Ed25519Signature, InstitutionKeyRing, KeyCustodyError,
        MasterKey, SealedKey, SoftwareKeyCustody,
    };
    use certi_core::CanonicalBytes;

    struct Harness {
        institutions: Arc<InMemoryInstitutionStore>,
        credentials: Arc<InMemoryCredentialStore>,
        audit_store: Arc<InMemoryAuditStore>,
        issuer: Issuer,
        id: InstitutionId,
    }

    fn harness_with(custody: Arc<dyn KeyCustody>, active: bool) -> Harness {
        harness_on(custody, active, None)
    }

    fn harness_on(
        custody: Arc<dyn KeyCustody>,
        active: bool,
        audit_override: Option<Arc<dyn AuditStore>>,
    ) -> Harness {
        let clock = Arc::new(ManualClock::new(Timestamp::parse("2026-03-03T03:03:03Z").unwrap()));
        let institutions = Arc::new(InMemoryInstitutionStore::new());
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let audit_store = Arc::new(InMemoryAuditStore::new());
        let backing: Arc<dyn AuditStore> = match audit_override {
            Some(store) => store,
            None => audit_store.clone(),
        };
        let audit = Arc::new(AuditChain::with_clock(backing, clock.clone()));

        let software = SoftwareKeyCustody::new(MasterKey::from_bytes([5; 32]));
        let (pk, sealed) = software.generate_key_pair().unwrap();
        let id = InstitutionId::new("univ-test").unwrap();
        institutions
            .insert(InstitutionRecord {
                institution_id: id.clone(),
                name: "Test University".into(),
                is_active: active,
                key_ring: InstitutionKeyRing::new(pk, sealed, clock.now()),
                created_at: clock.now(),
                deactivated_at: None,
            })
            .unwrap();

        let issuer = Issuer::new(
            institutions.clone(),
            credentials.clone(),
            audit,
            custody,
            clock,
        );
        Harness {
            institutions,
            credentials,
            audit_store,
            issuer,
            id,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(SoftwareKeyCustody::new(MasterKey::from_bytes([5; 32]))),
            true,
        )
    }

    fn request<'a>(id: &'a InstitutionId, doc: &'a [u8]) -> IssuanceRequest<'a> {
        IssuanceRequest {
            institution_id: id,
            document: doc,
            page_ranges: &[],
            document_type: "diploma",
            expires_at: None,
            actor: Some(ActorId::new("registrar")),
        }
    }

    #[test]
    fn issues_blob_credential() {
        let h = harness();
        let doc = b"Bachelor of Science, First Class";
        let issued = h.issuer.issue(request(&h.id, doc)).unwrap();

        assert_eq!(issued.record.document_hash, fingerprint(doc));
        assert_eq!(issued.record.merkle_root, issued.record.document_hash);
        assert_eq!(issued.record.key_epoch, 1);
        assert!(issued.record.page_hashes.is_empty());
        assert_eq!(issued.audit_entry.event_type, AuditEventType::DocumentIssued);
        assert_eq!(issued.audit_entry.chain_position, 1);
        assert_eq!(
            h.credentials.get(&issued.record.document_id).unwrap(),
            Some(issued.record.clone())
        );

        let decoded = ProofToken::decode(Some(issued.encoded_token.as_bytes())).unwrap();
        assert_eq!(decoded, issued.token);

        let pk = h.institutions.get(&h.id).unwrap().unwrap().key_ring.current().public_key.clone();
        let bytes = build_payload(&decoded.payload()).unwrap();
        assert!(certi_vc::verify(&bytes, &decoded.signature, &pk));
    }

    #[test]
    fn issues_paginated_credential() {
        let h = harness();
        let doc = b"page-one|page-two|page-three";
        let mut req = request(&h.id, doc);
        let ranges = [0..8, 9..17, 18..28];
        req.page_ranges = &ranges;
        let issued = h.issuer.issue(req).unwrap();
        assert_eq!(issued.record.page_hashes.len(), 3);
        assert_ne!(issued.record.merkle_root, issued.record.document_hash);
    }

    #[test]
    fn unknown_and_inactive_institutions_are_rejected() {
        let h = harness();
        let other = InstitutionId::new("nobody").unwrap();
        assert!(matches!(
            h.issuer.issue(request(&other, b"x")),
            Err(IssuanceError::InstitutionNotFound(_))
        ));

        let h = harness_with(
            Arc::new(SoftwareKeyCustody::new(MasterKey::from_bytes([5; 32]))),
            false,
        );
        assert!(matches!(
            h.issuer.issue(request(&h.id, b"x")),
            Err(IssuanceError::InstitutionInactive(_))
        ));
    }

    #[test]
    fn invalid_payload_is_rejected_before_signing() {
        let h = harness();
        let mut req = request(&h.id, b"doc");
        req.document_type = "   ";
        assert!(matches!(h.issuer.issue(req), Err(IssuanceError::InvalidPayload(_))));

        let mut req = request(&h.id, b"doc");
        req.expires_at = Some(Timestamp::parse("2020-01-01T00:00:00Z").unwrap());
        assert!(matches!(h.issuer.issue(req), Err(IssuanceError::InvalidPayload(_))));
        assert!(h.audit_store.snapshot().is_empty());
    }

    #[test]
    fn bad_page_range_is_rejected() {
        let h = harness();
        let mut req = request(&h.id, b"short");
        let ranges = [0..100];
        req.page_ranges = &ranges;
        assert!(matches!(h.issuer.issue(req), Err(IssuanceError::Fingerprint(_))));
    }

    struct BrokenCustody;

    impl KeyCustody for BrokenCustody {
        fn generate_key_pair(&self) -> Result<(Ed25519PublicKey, SealedKey), KeyCustodyError> {
            Err(KeyCustodyError::Seal("hsm offline".into()))
        }

        fn sign(
            &self,
            _: &SealedKey,
            _: &Ed25519PublicKey,
            _: &CanonicalBytes,
        ) -> Result<Ed25519Signature, KeyCustodyError> {
            Err(KeyCustodyError::Unseal("hsm offline".into()))
        }

        fn provider_name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn custody_failure_aborts_without_audit_or_record() {
        let h = harness_with(Arc::new(BrokenCustody), true);
        let err = h.issuer.issue(request(&h.id, b"doc")).unwrap_err();
        assert!(matches!(err, IssuanceError::Custody(_)));
        assert!(h.audit_store.snapshot().is_empty());
        assert!(h.credentials.list(None).unwrap().is_empty());
    }

    #[test]
    fn wrong_master_key_fails_closed() {
        let h = harness_with(
            Arc::new(SoftwareKeyCustody::new(MasterKey::from_bytes([6; 32]))),
            true,
        );
        assert!(matches!(
            h.issuer.issue(request(&h.id, b"doc")),
            Err(IssuanceError::Custody(KeyCustodyError::Unseal(_)))
        ));
        assert!(h.audit_store.snapshot().is_empty());
    }

    /// Accepts every entry except `document_issued`.
    struct RejectsIssuedEntries(InMemoryAuditStore);

    impl AuditStore for RejectsIssuedEntries {
        fn tail(&self, chain: &ChainKey) -> Result<Option<AuditLogEntry>, AuditError> {
            self.0.tail(chain)
        }
        fn insert(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
            if entry.event_type == AuditEventType::DocumentIssued {
                return Err(AuditError::Store("disk full".into()));
            }
            self.0.insert(entry)
        }
        fn entries(&self, chain: &ChainKey) -> Result<Vec<AuditLogEntry>, AuditError> {
            self.0.entries(chain)
        }
        fn chains(&self) -> Result<Vec<ChainKey>, AuditError> {
            self.0.chains()
        }
    }

    #[test]
    fn failed_issuance_entry_leaves_no_stored_credential() {
        let h = harness_on(
            Arc::new(SoftwareKeyCustody::new(MasterKey::from_bytes([5; 32]))),
            true,
            Some(Arc::new(RejectsIssuedEntries(InMemoryAuditStore::new()))),
        );
        let err = h.issuer.issue(request(&h.id, b"doc")).unwrap_err();
        assert!(matches!(err, IssuanceError::Audit(_)));
        assert!(h.credentials.list(None).unwrap().is_empty());
    }
}
