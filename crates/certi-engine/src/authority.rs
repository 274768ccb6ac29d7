//! # Credential Authority
//!
//! The facade over institution lifecycle, issuance, revocation,
//! verification and the audit trail.
//!
//! ## Rotation Gate
//!
//! Each institution has a reader/writer gate. Issuance holds the read side
//! while it snapshots the current key epoch and signs; rotation holds the
//! write side while it generates, seals and publishes the next epoch. A
//! credential is therefore always signed by the epoch that was current when
//! it was issued, and issuances for one institution still run in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use certi_audit::{AuditChain, AuditEventType, AuditRecord, InMemoryAuditStore};
use certi_core::{ActorId, Clock, DocumentId, InstitutionId, SystemClock};
use certi_crypto::{InstitutionKeyRing, KeyCustody, KeyEpoch, SoftwareKeyCustody};
use certi_vc::CredentialRecord;

use crate::attestation::AttestationService;
use crate::config::EngineConfig;
use crate::error::{AuthorityError, StoreError};
use crate::issuance::{append_or_rollback, IssuanceRequest, IssuedCredential, Issuer};
use crate::result::VerificationResult;
use crate::snapshot::{EngineSnapshot, SNAPSHOT_FORMAT};
use crate::store::{
    CredentialStore, InMemoryCredentialStore, InMemoryInstitutionStore, InstitutionRecord,
    InstitutionStore,
};
use crate::verification::{VerificationClaim, VerificationRequest, Verifier};

/// Maximum length of an institution display name.
pub const MAX_INSTITUTION_NAME_LEN: usize = 256;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`CredentialAuthority`]. Unset collaborators default to the
/// in-memory stores and the system clock.
pub struct AuthorityBuilder {
    custody: Arc<dyn KeyCustody>,
    clock: Arc<dyn Clock>,
    institutions: Option<Arc<dyn InstitutionStore>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    audit: Option<Arc<AuditChain>>,
    attestation: Option<Arc<dyn AttestationService>>,
    fold_expired_into_revoked: bool,
}

impl AuthorityBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn institution_store(mut self, store: Arc<dyn InstitutionStore>) -> Self {
        self.institutions = Some(store);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn audit_chain(mut self, audit: Arc<AuditChain>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn attestation(mut self, service: Arc<dyn AttestationService>) -> Self {
        self.attestation = Some(service);
        self
    }

    pub fn fold_expired_into_revoked(mut self, fold: bool) -> Self {
        self.fold_expired_into_revoked = fold;
        self
    }

    pub fn build(self) -> CredentialAuthority {
        let institutions = self
            .institutions
            .unwrap_or_else(|| Arc::new(InMemoryInstitutionStore::new()));
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()));
        let clock = self.clock;
        let audit = self.audit.unwrap_or_else(|| {
            Arc::new(AuditChain::with_clock(
                Arc::new(InMemoryAuditStore::new()),
                clock.clone(),
            ))
        });

        let issuer = Issuer::new(
            institutions.clone(),
            credentials.clone(),
            audit.clone(),
            self.custody.clone(),
            clock.clone(),
        );
        let mut verifier = Verifier::new(
            institutions.clone(),
            credentials.clone(),
            audit.clone(),
            clock.clone(),
        )
        .fold_expired_into_revoked(self.fold_expired_into_revoked);
        if let Some(service) = self.attestation {
            verifier = verifier.with_attestation(service);
        }

        CredentialAuthority {
            institutions,
            credentials,
            audit,
            custody: self.custody,
            clock,
            issuer,
            verifier,
            gates: DashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CredentialAuthority
// ---------------------------------------------------------------------------

pub struct CredentialAuthority {
    institutions: Arc<dyn InstitutionStore>,
    credentials: Arc<dyn CredentialStore>,
    audit: Arc<AuditChain>,
    custody: Arc<dyn KeyCustody>,
    clock: Arc<dyn Clock>,
    issuer: Issuer,
    verifier: Verifier,
    gates: DashMap<InstitutionId, Arc<RwLock<()>>>,
}

impl std::fmt::Debug for CredentialAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialAuthority")
            .field("custody", &self.custody.provider_name())
            .finish_non_exhaustive()
    }
}

impl CredentialAuthority {
    pub fn builder(custody: Arc<dyn KeyCustody>) -> AuthorityBuilder {
        AuthorityBuilder {
            custody,
            clock: Arc::new(SystemClock),
            institutions: None,
            credentials: None,
            audit: None,
            attestation: None,
            fold_expired_into_revoked: false,
        }
    }

    /// An in-memory authority with software key custody under the configured
    /// master key.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::builder(Arc::new(SoftwareKeyCustody::new(config.master_key.clone())))
            .fold_expired_into_revoked(config.fold_expired_into_revoked)
            .build()
    }

    /// Rebuild an in-memory authority from a snapshot.
    pub fn restore(
        config: &EngineConfig,
        snapshot: EngineSnapshot,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let audit = Arc::new(AuditChain::with_clock(
            Arc::new(InMemoryAuditStore::from_entries(snapshot.audit)),
            clock.clone(),
        ));
        Self::builder(Arc::new(SoftwareKeyCustody::new(config.master_key.clone())))
            .clock(clock)
            .institution_store(Arc::new(InMemoryInstitutionStore::from_records(
                snapshot.institutions,
            )))
            .credential_store(Arc::new(InMemoryCredentialStore::from_records(
                snapshot.credentials,
            )))
            .audit_chain(audit)
            .fold_expired_into_revoked(config.fold_expired_into_revoked)
            .build()
    }

    /// Capture the full state through the store traits.
    pub fn snapshot(&self) -> Result<EngineSnapshot, AuthorityError> {
        let audit_store = self.audit.store();
        let mut audit = Vec::new();
        for chain in audit_store.chains()? {
            audit.extend(audit_store.entries(&chain)?);
        }
        Ok(EngineSnapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            institutions: self.institutions.list()?,
            credentials: self.credentials.list(None)?,
            audit,
        })
    }

    fn gate(&self, id: &InstitutionId) -> Arc<RwLock<()>> {
        Arc::clone(&self.gates.entry(id.clone()).or_default())
    }

    fn require_institution(&self, id: &InstitutionId) -> Result<InstitutionRecord, AuthorityError> {
        self.institutions
            .get(id)?
            .ok_or_else(|| AuthorityError::InstitutionNotFound(id.clone()))
    }

    // -- institution lifecycle ----------------------------------------------

    /// Onboard an institution with a fresh epoch-1 signing key. A generated
    /// identifier is used when `institution_id` is `None`.
    pub fn onboard_institution(
        &self,
        name: &str,
        institution_id: Option<InstitutionId>,
        actor: Option<ActorId>,
    ) -> Result<InstitutionRecord, AuthorityError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_INSTITUTION_NAME_LEN {
            return Err(AuthorityError::InvalidName(format!(
                "name must be 1 to {MAX_INSTITUTION_NAME_LEN} bytes"
            )));
        }
        let institution_id = institution_id.unwrap_or_else(InstitutionId::generate);
        if self.institutions.get(&institution_id)?.is_some() {
            return Err(AuthorityError::InstitutionExists(institution_id));
        }

        let (public_key, sealed_key) = self.custody.generate_key_pair()?;
        let now = self.clock.now();
        let record = InstitutionRecord {
            institution_id: institution_id.clone(),
            name: name.to_string(),
            is_active: true,
            key_ring: InstitutionKeyRing::new(public_key, sealed_key, now),
            created_at: now,
            deactivated_at: None,
        };
        self.institutions.insert(record.clone()).map_err(|err| match err {
            StoreError::Duplicate(_) => AuthorityError::InstitutionExists(institution_id.clone()),
            other => other.into(),
        })?;

        append_or_rollback(
            &self.audit,
            AuditRecord::new(AuditEventType::InstitutionOnboarded)
                .institution(institution_id.clone())
                .actor(actor)
                .metadata(serde_json::json!({
                    "name": record.name,
                    "public_key": record.key_ring.current().public_key.to_hex(),
                    "key_epoch": 1,
                })),
            || self.institutions.remove(&institution_id).map(drop),
        )?;
        tracing::info!(institution = %institution_id, name = %record.name, "institution onboarded");
        Ok(record)
    }

    /// Permanently deactivate an institution. Its credentials stop verifying.
    pub fn deactivate_institution(
        &self,
        institution_id: &InstitutionId,
        actor: Option<ActorId>,
    ) -> Result<InstitutionRecord, AuthorityError> {
        let gate = self.gate(institution_id);
        let _write = gate.write();

        let previous = self.require_institution(institution_id)?;
        if !previous.is_active {
            return Err(AuthorityError::InstitutionInactive(institution_id.clone()));
        }
        let mut record = previous.clone();
        record.is_active = false;
        record.deactivated_at = Some(self.clock.now());
        self.institutions.update(record.clone())?;

        append_or_rollback(
            &self.audit,
            AuditRecord::new(AuditEventType::InstitutionDeactivated)
                .institution(institution_id.clone())
                .actor(actor),
            || self.institutions.update(previous),
        )?;
        tracing::info!(institution = %institution_id, "institution deactivated");
        Ok(record)
    }

    /// Rotate the institution's signing key. The previous epoch becomes
    /// verify-only. Returns the new current epoch.
    pub fn rotate_key(
        &self,
        institution_id: &InstitutionId,
        actor: Option<ActorId>,
    ) -> Result<KeyEpoch, AuthorityError> {
        let gate = self.gate(institution_id);
        let _write = gate.write();

        let previous = self.require_institution(institution_id)?;
        if !previous.is_active {
            return Err(AuthorityError::InstitutionInactive(institution_id.clone()));
        }
        let (public_key, sealed_key) = self.custody.generate_key_pair()?;
        let mut record = previous.clone();
        let epoch = record
            .key_ring
            .rotate(public_key, sealed_key, self.clock.now())
            .clone();
        self.institutions.update(record)?;

        append_or_rollback(
            &self.audit,
            AuditRecord::new(AuditEventType::KeyRotated)
                .institution(institution_id.clone())
                .actor(actor)
                .metadata(serde_json::json!({
                    "key_epoch": epoch.epoch,
                    "public_key": epoch.public_key.to_hex(),
                })),
            || self.institutions.update(previous),
        )?;
        tracing::info!(institution = %institution_id, key_epoch = epoch.epoch, "signing key rotated");
        Ok(epoch)
    }

    pub fn institution(&self, id: &InstitutionId) -> Result<Option<InstitutionRecord>, AuthorityError> {
        Ok(self.institutions.get(id)?)
    }

    pub fn institutions(&self) -> Result<Vec<InstitutionRecord>, AuthorityError> {
        Ok(self.institutions.list()?)
    }

    // -- credentials --------------------------------------------------------

    pub fn issue(&self, request: IssuanceRequest<'_>) -> Result<IssuedCredential, AuthorityError> {
        let gate = self.gate(request.institution_id);
        let _read = gate.read();
        Ok(self.issuer.issue(request)?)
    }

    /// Revoke a credential. Revocation is permanent.
    pub fn revoke(
        &self,
        document_id: &DocumentId,
        reason: Option<String>,
        actor: Option<ActorId>,
    ) -> Result<CredentialRecord, AuthorityError> {
        let previous = self
            .credentials
            .get(document_id)?
            .ok_or(AuthorityError::CredentialNotFound(*document_id))?;
        let mut record = previous.clone();
        if !record.revoke(self.clock.now(), reason) {
            return Err(AuthorityError::AlreadyRevoked(*document_id));
        }
        self.credentials.update(record.clone())?;

        append_or_rollback(
            &self.audit,
            AuditRecord::new(AuditEventType::DocumentRevoked)
                .institution(record.institution_id.clone())
                .document_hash(record.document_hash.clone())
                .actor(actor)
                .metadata(serde_json::json!({
                    "document_id": document_id.to_string(),
                    "reason": record.revocation_reason,
                })),
            || self.credentials.update(previous),
        )?;
        tracing::info!(
            institution = %record.institution_id,
            document_id = %document_id,
            "credential revoked"
        );
        Ok(record)
    }

    pub fn credential(&self, id: &DocumentId) -> Result<Option<CredentialRecord>, AuthorityError> {
        Ok(self.credentials.get(id)?)
    }

    pub fn credentials(
        &self,
        institution_id: Option<&InstitutionId>,
    ) -> Result<Vec<CredentialRecord>, AuthorityError> {
        Ok(self.credentials.list(institution_id)?)
    }

    // -- verification -------------------------------------------------------

    pub fn verify_document(&self, request: VerificationRequest<'_>) -> VerificationResult {
        self.verifier.verify_document(request)
    }

    pub fn verify_claim(
        &self,
        claim: &VerificationClaim,
        actor: Option<ActorId>,
    ) -> VerificationResult {
        self.verifier.verify_claim(claim, actor)
    }

    // -- audit --------------------------------------------------------------

    pub fn audit(&self) -> &AuditChain {
        &self.audit
    }
}
