//! # Institution and Credential Stores
//!
//! Persistence seams for the authority. The in-memory implementations are
//! what the CLI uses, snapshotting them to a JSON state file between runs.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use certi_core::{DocumentId, InstitutionId, Timestamp};
use certi_crypto::InstitutionKeyRing;
use certi_vc::CredentialRecord;

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An onboarded institution and its key history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionRecord {
    pub institution_id: InstitutionId,
    pub name: String,
    pub is_active: bool,
    pub key_ring: InstitutionKeyRing,
    pub created_at: Timestamp,
    #[serde(default)]
    pub deactivated_at: Option<Timestamp>,
}

impl InstitutionRecord {
    /// When the signing key was last rotated, if ever.
    pub fn key_rotated_at(&self) -> Option<Timestamp> {
        self.key_ring.last_rotated_at()
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait InstitutionStore: Send + Sync {
    fn get(&self, id: &InstitutionId) -> Result<Option<InstitutionRecord>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] if the id is taken.
    fn insert(&self, record: InstitutionRecord) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] if the id is unknown.
    fn update(&self, record: InstitutionRecord) -> Result<(), StoreError>;

    /// Delete a record, returning it. Used to undo an onboarding whose audit
    /// entry could not be written.
    fn remove(&self, id: &InstitutionId) -> Result<Option<InstitutionRecord>, StoreError>;

    fn list(&self) -> Result<Vec<InstitutionRecord>, StoreError>;
}

pub trait CredentialStore: Send + Sync {
    fn get(&self, id: &DocumentId) -> Result<Option<CredentialRecord>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] if the id is taken.
    fn insert(&self, record: CredentialRecord) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] if the id is unknown.
    fn update(&self, record: CredentialRecord) -> Result<(), StoreError>;

    /// Delete a record, returning it. Used to undo an issuance whose audit
    /// entry could not be written.
    fn remove(&self, id: &DocumentId) -> Result<Option<CredentialRecord>, StoreError>;

    /// Credentials an institution issued over a given document hash.
    /// Comparison is case-insensitive.
    fn find_by_hash(
        &self,
        institution_id: &InstitutionId,
        document_hash: &str,
    ) -> Result<Vec<CredentialRecord>, StoreError>;

    /// All credentials, optionally restricted to one institution.
    fn list(&self, institution_id: Option<&InstitutionId>)
        -> Result<Vec<CredentialRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryInstitutionStore {
    records: RwLock<BTreeMap<InstitutionId, InstitutionRecord>>,
}

impl InMemoryInstitutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = InstitutionRecord>) -> Self {
        Self {
            records: RwLock::new(
                records
                    .into_iter()
                    .map(|r| (r.institution_id.clone(), r))
                    .collect(),
            ),
        }
    }
}

impl InstitutionStore for InMemoryInstitutionStore {
    fn get(&self, id: &InstitutionId) -> Result<Option<InstitutionRecord>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn insert(&self, record: InstitutionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.institution_id) {
            return Err(StoreError::Duplicate(record.institution_id.to_string()));
        }
        records.insert(record.institution_id.clone(), record);
        Ok(())
    }

    fn update(&self, record: InstitutionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        match records.get_mut(&record.institution_id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(record.institution_id.to_string())),
        }
    }

    fn remove(&self, id: &InstitutionId) -> Result<Option<InstitutionRecord>, StoreError> {
        Ok(self.records.write().remove(id))
    }

    fn list(&self) -> Result<Vec<InstitutionRecord>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<BTreeMap<DocumentId, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = CredentialRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.document_id, r)).collect()),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, id: &DocumentId) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.read().get(id).cloned())
    }

    fn insert(&self, record: CredentialRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.document_id) {
            return Err(StoreError::Duplicate(record.document_id.to_string()));
        }
        records.insert(record.document_id, record);
        Ok(())
    }

    fn update(&self, record: CredentialRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        match records.get_mut(&record.document_id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(record.document_id.to_string())),
        }
    }

    fn remove(&self, id: &DocumentId) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.write().remove(id))
    }

    fn find_by_hash(
        &self,
        institution_id: &InstitutionId,
        document_hash: &str,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| {
                &r.institution_id == institution_id
                    && r.document_hash.eq_ignore_ascii_case(document_hash)
            })
            .cloned()
            .collect())
    }

    fn list(
        &self,
        institution_id: Option<&InstitutionId>,
    ) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut records: Vec<CredentialRecord> = self
            .records
            .read()
            .values()
            .filter(|r| institution_id.map_or(true, |id| &r.institution_id == id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(records)
    }
}
