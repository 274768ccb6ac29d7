//! Audit persistence.
//!
//! The chain logic only needs four things from storage: the tail of a chain,
//! an append, an ordered read of a chain, and the list of chains.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use certi_core::InstitutionId;

use crate::entry::AuditLogEntry;
use crate::error::AuditError;

/// Identifies a chain: an institution's, or the global chain (`None`).
pub type ChainKey = Option<InstitutionId>;

pub(crate) fn chain_label(chain: &ChainKey) -> String {
    match chain {
        Some(id) => id.to_string(),
        None => "<global>".to_string(),
    }
}

/// Storage backend for audit entries.
///
/// Implementations must reject an `insert` whose `chain_position` is not
/// exactly one past the current tail.
pub trait AuditStore: Send + Sync {
    /// The last entry of a chain, if any.
    fn tail(&self, chain: &ChainKey) -> Result<Option<AuditLogEntry>, AuditError>;

    /// Persist a new tail entry.
    fn insert(&self, entry: AuditLogEntry) -> Result<(), AuditError>;

    /// All entries of a chain, in position order.
    fn entries(&self, chain: &ChainKey) -> Result<Vec<AuditLogEntry>, AuditError>;

    /// Every chain that has at least one entry.
    fn chains(&self) -> Result<Vec<ChainKey>, AuditError>;
}

/// In-memory audit store.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    chains: RwLock<BTreeMap<ChainKey, Vec<AuditLogEntry>>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a snapshot. Entries are grouped by chain and ordered by
    /// position; no integrity check is made here.
    pub fn from_entries(entries: impl IntoIterator<Item = AuditLogEntry>) -> Self {
        let mut chains: BTreeMap<ChainKey, Vec<AuditLogEntry>> = BTreeMap::new();
        for entry in entries {
            chains.entry(entry.institution_id.clone()).or_default().push(entry);
        }
        for entries in chains.values_mut() {
            entries.sort_by_key(|e| e.chain_position);
        }
        Self {
            chains: RwLock::new(chains),
        }
    }

    /// Every entry of every chain, for snapshotting.
    pub fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.chains.read().values().flatten().cloned().collect()
    }

    /// Mutate a stored entry in place, bypassing the chain. Returns `false`
    /// if no entry exists at that position. Used to simulate storage-level
    /// tampering.
    pub fn tamper_with(
        &self,
        chain: &ChainKey,
        chain_position: u64,
        f: impl FnOnce(&mut AuditLogEntry),
    ) -> bool {
        let mut chains = self.chains.write();
        let entry = chains
            .get_mut(chain)
            .and_then(|entries| entries.iter_mut().find(|e| e.chain_position == chain_position));
        match entry {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        }
    }
}

impl AuditStore for InMemoryAuditStore {
    fn tail(&self, chain: &ChainKey) -> Result<Option<AuditLogEntry>, AuditError> {
        Ok(self
            .chains
            .read()
            .get(chain)
            .and_then(|entries| entries.last().cloned()))
    }

    fn insert(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        let mut chains = self.chains.write();
        let entries = chains.entry(entry.institution_id.clone()).or_default();
        let expected = entries.len() as u64 + 1;
        if entry.chain_position != expected {
            return Err(AuditError::PositionConflict {
                chain: chain_label(&entry.institution_id),
                expected,
                actual: entry.chain_position,
            });
        }
        entries.push(entry);
        Ok(())
    }

    fn entries(&self, chain: &ChainKey) -> Result<Vec<AuditLogEntry>, AuditError> {
        Ok(self.chains.read().get(chain).cloned().unwrap_or_default())
    }

    fn chains(&self) -> Result<Vec<ChainKey>, AuditError> {
        Ok(self.chains.read().keys().cloned().collect())
    }
}
