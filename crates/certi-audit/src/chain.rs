//! # Audit Chain
//!
//! Serialized appends and integrity replay over an [`AuditStore`].
//!
//! Each chain has its own mutex, held from reading the tail until the new
//! entry is persisted. Appends to one chain therefore produce positions
//! `1..=N` with no gaps or duplicates, while appends to different chains do
//! not contend.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use certi_core::{Clock, SystemClock};

use crate::entry::{compute_log_hash, AuditEventType, AuditLogEntry, AuditRecord, GENESIS_HASH};
use crate::error::AuditError;
use crate::store::{chain_label, AuditStore, ChainKey};

/// Outcome of replaying one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainIntegrityReport {
    pub valid: bool,
    /// Entries examined, including the broken one.
    pub entries_checked: u64,
    /// Position of the first entry that fails verification.
    pub broken_position: Option<u64>,
    pub reason: Option<String>,
}

impl ChainIntegrityReport {
    fn intact(entries_checked: u64) -> Self {
        Self {
            valid: true,
            entries_checked,
            broken_position: None,
            reason: None,
        }
    }

    fn broken(entries_checked: u64, position: u64, reason: String) -> Self {
        Self {
            valid: false,
            entries_checked,
            broken_position: Some(position),
            reason: Some(reason),
        }
    }
}

/// Filter for [`AuditChain::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Restrict to one chain. `None` searches every chain.
    pub chain: Option<ChainKey>,
    pub event_type: Option<AuditEventType>,
    pub document_hash: Option<String>,
    /// Maximum entries returned. `None` is unbounded.
    pub limit: Option<usize>,
    pub offset: usize,
}

/// The append-only audit log.
pub struct AuditChain {
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    locks: DashMap<ChainKey, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for AuditChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditChain")
            .field("locked_chains", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl AuditChain {
    /// Chain over `store` using the system clock.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn AuditStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: DashMap::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    fn chain_lock(&self, chain: &ChainKey) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(chain.clone()).or_default())
    }

    /// Append an event to the chain named by `record.institution_id`.
    pub fn append(&self, record: AuditRecord) -> Result<AuditLogEntry, AuditError> {
        let chain = record.institution_id.clone();
        let lock = self.chain_lock(&chain);
        let _guard = lock.lock();

        let (previous_log_hash, position) = match self.store.tail(&chain)? {
            Some(tail) => (tail.log_hash, tail.chain_position + 1),
            None => (GENESIS_HASH.to_string(), 1),
        };
        let entry = AuditLogEntry::seal(record, previous_log_hash, position, self.clock.now())?;
        self.store.insert(entry.clone())?;

        tracing::debug!(
            chain = %chain_label(&chain),
            position = entry.chain_position,
            event = %entry.event_type,
            "audit entry appended"
        );
        Ok(entry)
    }

    /// Replay a chain from genesis.
    pub fn verify_chain_integrity(
        &self,
        chain: &ChainKey,
    ) -> Result<ChainIntegrityReport, AuditError> {
        let entries = self.store.entries(chain)?;
        let mut expected_previous = GENESIS_HASH.to_string();

        for (i, entry) in entries.iter().enumerate() {
            let checked = i as u64 + 1;
            let broken = |reason: String| {
                tracing::warn!(
                    chain = %chain_label(chain),
                    position = entry.chain_position,
                    %reason,
                    "audit chain integrity violation"
                );
                ChainIntegrityReport::broken(checked, entry.chain_position, reason)
            };

            if entry.chain_position != checked {
                return Ok(broken(format!(
                    "expected position {checked}, found {}",
                    entry.chain_position
                )));
            }
            if &entry.institution_id != chain {
                return Ok(broken("entry belongs to a different chain".into()));
            }
            if entry.previous_log_hash != expected_previous {
                return Ok(broken(
                    "previous_log_hash does not match the preceding entry".into(),
                ));
            }
            if compute_log_hash(entry)? != entry.log_hash {
                return Ok(broken("log_hash does not match entry contents".into()));
            }
            expected_previous.clone_from(&entry.log_hash);
        }
        Ok(ChainIntegrityReport::intact(entries.len() as u64))
    }

    /// `true` if the chain replays cleanly.
    pub fn is_chain_intact(&self, chain: &ChainKey) -> Result<bool, AuditError> {
        Ok(self.verify_chain_integrity(chain)?.valid)
    }

    /// Every chain in the store with its integrity report.
    pub fn verify_all(&self) -> Result<Vec<(ChainKey, ChainIntegrityReport)>, AuditError> {
        self.store
            .chains()?
            .into_iter()
            .map(|chain| {
                let report = self.verify_chain_integrity(&chain)?;
                Ok((chain, report))
            })
            .collect()
    }

    /// Matching entries, newest first.
    pub fn query(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, AuditError> {
        let chains = match &query.chain {
            Some(chain) => vec![chain.clone()],
            None => self.store.chains()?,
        };

        let mut matched = Vec::new();
        for chain in &chains {
            matched.extend(self.store.entries(chain)?.into_iter().filter(|e| {
                query.event_type.map_or(true, |t| e.event_type == t)
                    && query.document_hash.as_deref().map_or(true, |h| {
                        e.document_hash
                            .as_deref()
                            .is_some_and(|d| d.eq_ignore_ascii_case(h))
                    })
            }));
        }
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.chain_position.cmp(&a.chain_position))
        });

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(query.offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAuditStore;
    use certi_core::{InstitutionId, ManualClock, Timestamp};

    fn setup() -> (Arc<InMemoryAuditStore>, AuditChain, ManualClock) {
        let store = Arc::new(InMemoryAuditStore::new());
        let clock = ManualClock::new(Timestamp::parse("2026-01-01T00:00:00Z").unwrap());
        let chain = AuditChain::with_clock(store.clone(), Arc::new(clock.clone()));
        (store, chain, clock)
    }

    fn inst(id: &str) -> InstitutionId {
        InstitutionId::new(id).unwrap()
    }

    fn issued(id: &str, n: u8) -> AuditRecord {
        AuditRecord::new(AuditEventType::DocumentIssued)
            .institution(inst(id))
            .document_hash(format!("{n:02x}").repeat(32))
    }

    #[test]
    fn first_entry_links_to_genesis() {
        let (_, chain, _) = setup();
        let e = chain.append(issued("a", 1)).unwrap();
        assert_eq!(e.chain_position, 1);
        assert_eq!(e.previous_log_hash, GENESIS_HASH);
    }

    #[test]
    fn entries_link_to_predecessor() {
        let (_, chain, clock) = setup();
        let first = chain.append(issued("a", 1)).unwrap();
        clock.advance_secs(5);
        let second = chain.append(issued("a", 2)).unwrap();
        assert_eq!(second.chain_position, 2);
        assert_eq!(second.previous_log_hash, first.log_hash);
        assert_eq!(second.created_at, first.created_at.plus_secs(5));
    }

    #[test]
    fn chains_have_independent_positions() {
        let (_, chain, _) = setup();
        chain.append(issued("a", 1)).unwrap();
        chain.append(issued("a", 2)).unwrap();
        let b = chain.append(issued("b", 3)).unwrap();
        let global = chain
            .append(AuditRecord::new(AuditEventType::VerificationFailed))
            .unwrap();
        assert_eq!(b.chain_position, 1);
        assert_eq!(global.chain_position, 1);
        assert_eq!(global.institution_id, None);
    }

    #[test]
    fn fresh_and_empty_chains_are_intact() {
        let (_, chain, _) = setup();
        let report = chain.verify_chain_integrity(&Some(inst("a"))).unwrap();
        assert_eq!(report, ChainIntegrityReport::intact(0));

        for n in 0..5 {
            chain.append(issued("a", n)).unwrap();
        }
        let report = chain.verify_chain_integrity(&Some(inst("a"))).unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 5);
    }

    #[test]
    fn mutated_document_hash_breaks_chain() {
        let (store, chain, _) = setup();
        for n in 0..4 {
            chain.append(issued("a", n)).unwrap();
        }
        let key = Some(inst("a"));
        store.tamper_with(&key, 3, |e| e.document_hash = Some("ee".repeat(32)));

        let report = chain.verify_chain_integrity(&key).unwrap();
        assert!(!report.valid);
        assert_eq!(report.broken_position, Some(3));
        assert_eq!(report.entries_checked, 3);
        assert!(!chain.is_chain_intact(&key).unwrap());
    }

    #[test]
    fn mutated_previous_hash_breaks_chain() {
        let (store, chain, _) = setup();
        for n in 0..3 {
            chain.append(issued("a", n)).unwrap();
        }
        let key = Some(inst("a"));
        store.tamper_with(&key, 2, |e| e.previous_log_hash = "ab".repeat(32));
        let report = chain.verify_chain_integrity(&key).unwrap();
        assert_eq!(report.broken_position, Some(2));
    }

    #[test]
    fn rehashed_forgery_is_caught_by_linkage() {
        let (store, chain, _) = setup();
        for n in 0..3 {
            chain.append(issued("a", n)).unwrap();
        }
        let key = Some(inst("a"));
        store.tamper_with(&key, 2, |e| {
            e.document_hash = Some("dd".repeat(32));
            e.log_hash = compute_log_hash(e).unwrap();
        });
        let report = chain.verify_chain_integrity(&key).unwrap();
        assert_eq!(report.broken_position, Some(3));
    }

    #[test]
    fn concurrent_appends_get_contiguous_positions() {
        let (store, chain, _) = setup();
        let chain = Arc::new(chain);
        let handles: Vec<_> = (0..16)
            .map(|t| {
                let chain = Arc::clone(&chain);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        chain.append(issued("busy", (t * 10 + i) as u8)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let key = Some(inst("busy"));
        let positions: Vec<u64> = store
            .entries(&key)
            .unwrap()
            .iter()
            .map(|e| e.chain_position)
            .collect();
        assert_eq!(positions, (1..=160).collect::<Vec<u64>>());
        assert!(chain.is_chain_intact(&key).unwrap());
    }

    #[test]
    fn query_filters_and_orders_newest_first() {
        let (_, chain, clock) = setup();
        chain.append(issued("a", 1)).unwrap();
        clock.advance_secs(1);
        chain.append(issued("b", 2)).unwrap();
        clock.advance_secs(1);
        chain
            .append(
                AuditRecord::new(AuditEventType::DocumentRevoked)
                    .institution(inst("a"))
                    .document_hash("01".repeat(32)),
            )
            .unwrap();

        let all = chain.query(&AuditQuery::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].event_type, AuditEventType::DocumentRevoked);

        let for_doc = chain
            .query(&AuditQuery {
                document_hash: Some("01".repeat(32).to_uppercase()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(for_doc.len(), 2);

        let issued_only = chain
            .query(&AuditQuery {
                event_type: Some(AuditEventType::DocumentIssued),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(issued_only.len(), 2);

        let chain_a = chain
            .query(&AuditQuery {
                chain: Some(Some(inst("a"))),
                limit: Some(1),
                offset: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(chain_a.len(), 1);
        assert_eq!(chain_a[0].chain_position, 1);
    }

    #[test]
    fn verify_all_covers_every_chain() {
        let (store, chain, _) = setup();
        chain.append(issued("a", 1)).unwrap();
        chain.append(issued("b", 1)).unwrap();
        let reports = chain.verify_all().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports.iter().filter(|(_, r)| r.valid).count(), 2);

        store.tamper_with(&Some(inst("b")), 1, |e| e.chain_position = 9);
        let reports = chain.verify_all().unwrap();
        assert_eq!(reports.iter().filter(|(_, r)| !r.valid).count(), 1);
    }
}
