//! # Audit Log Entries
//!
//! An entry's `log_hash` commits to every other field of the entry,
//! including its chain position and the previous entry's hash:
//!
//! ```text
//! log_hash = SHA256(JCS(entry without "log_hash"))
//! ```

use serde::{Deserialize, Serialize};

use certi_core::{sha256_hex, ActorId, CanonicalBytes, InstitutionId, Timestamp};

use crate::error::AuditError;

/// `previous_log_hash` of the first entry in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    InstitutionOnboarded,
    InstitutionDeactivated,
    KeyRotated,
    DocumentIssued,
    DocumentRevoked,
    VerificationSuccess,
    VerificationFailed,
}

impl AuditEventType {
    /// All event types, in lifecycle order.
    pub const ALL: [AuditEventType; 7] = [
        Self::InstitutionOnboarded,
        Self::InstitutionDeactivated,
        Self::KeyRotated,
        Self::DocumentIssued,
        Self::DocumentRevoked,
        Self::VerificationSuccess,
        Self::VerificationFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstitutionOnboarded => "institution_onboarded",
            Self::InstitutionDeactivated => "institution_deactivated",
            Self::KeyRotated => "key_rotated",
            Self::DocumentIssued => "document_issued",
            Self::DocumentRevoked => "document_revoked",
            Self::VerificationSuccess => "verification_success",
            Self::VerificationFailed => "verification_failed",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown audit event type {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// AuditRecord (what callers hand to `append`)
// ---------------------------------------------------------------------------

/// The caller-supplied part of an audit entry. The chain fills in position,
/// linkage, timestamp and hash.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub institution_id: Option<InstitutionId>,
    pub event_type: AuditEventType,
    pub document_hash: Option<String>,
    pub actor: Option<ActorId>,
    pub metadata: serde_json::Value,
}

impl AuditRecord {
    /// A record for the global chain with no document, actor or metadata.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            institution_id: None,
            event_type,
            document_hash: None,
            actor: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn institution(mut self, institution_id: InstitutionId) -> Self {
        self.institution_id = Some(institution_id);
        self
    }

    pub fn document_hash(mut self, hash: impl Into<String>) -> Self {
        self.document_hash = Some(hash.into());
        self
    }

    pub fn actor(mut self, actor: Option<ActorId>) -> Self {
        self.actor = actor;
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ---------------------------------------------------------------------------
// AuditLogEntry
// ---------------------------------------------------------------------------

/// One link of an audit chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Owning chain; `None` is the global chain.
    pub institution_id: Option<InstitutionId>,
    pub event_type: AuditEventType,
    pub document_hash: Option<String>,
    /// SHA-256 over the canonical form of every other field.
    pub log_hash: String,
    /// `log_hash` of the preceding entry, or [`GENESIS_HASH`].
    pub previous_log_hash: String,
    /// 1-based position within the chain.
    pub chain_position: u64,
    pub created_at: Timestamp,
    pub actor: Option<ActorId>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditLogEntry {
    /// Build the next entry of a chain and seal its `log_hash`.
    pub(crate) fn seal(
        record: AuditRecord,
        previous_log_hash: String,
        chain_position: u64,
        created_at: Timestamp,
    ) -> Result<Self, AuditError> {
        let mut entry = Self {
            institution_id: record.institution_id,
            event_type: record.event_type,
            document_hash: record.document_hash,
            log_hash: String::new(),
            previous_log_hash,
            chain_position,
            created_at,
            actor: record.actor,
            metadata: record.metadata,
        };
        entry.log_hash = compute_log_hash(&entry)?;
        Ok(entry)
    }

    /// True if the stored `log_hash` matches the entry's contents.
    pub fn hash_is_valid(&self) -> Result<bool, AuditError> {
        Ok(compute_log_hash(self)? == self.log_hash)
    }
}

/// Recompute the hash an entry should carry. The stored `log_hash` value
/// does not influence the result.
pub fn compute_log_hash(entry: &AuditLogEntry) -> Result<String, AuditError> {
    let mut value = serde_json::to_value(entry)?;
    match value.as_object_mut() {
        Some(obj) => {
            obj.remove("log_hash");
        }
        None => {
            return Err(AuditError::Serialization(
                <serde_json::Error as serde::ser::Error>::custom(
                    "audit entry did not serialize to a JSON object",
                ),
            ));
        }
    }
    let canonical = CanonicalBytes::new(&value)?;
    Ok(sha256_hex(&canonical))
}
