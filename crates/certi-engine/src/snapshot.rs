//! JSON state snapshot.
//!
//! The CLI has no database: between invocations the whole engine state
//! (institutions with sealed keys, credential records, audit entries) lives
//! in one JSON file. Private keys in it are sealed under the master key.

use std::path::Path;

use serde::{Deserialize, Serialize};

use certi_audit::AuditLogEntry;
use certi_vc::CredentialRecord;

use crate::error::StoreError;
use crate::store::InstitutionRecord;

pub const SNAPSHOT_FORMAT: &str = "certitrust.state.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub format: String,
    pub institutions: Vec<InstitutionRecord>,
    pub credentials: Vec<CredentialRecord>,
    pub audit: Vec<AuditLogEntry>,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            format: SNAPSHOT_FORMAT.to_string(),
            institutions: Vec::new(),
            credentials: Vec::new(),
            audit: Vec::new(),
        }
    }
}

impl EngineSnapshot {
    /// Read a snapshot. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        let snapshot: Self = serde_json::from_slice(&bytes)?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(StoreError::UnsupportedFormat {
                expected: SNAPSHOT_FORMAT.to_string(),
                found: snapshot.format,
            });
        }
        Ok(snapshot)
    }

    /// Write the snapshot, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
