//! # CLI State
//!
//! Each stateful invocation loads the snapshot, rebuilds an in-memory
//! authority from it, runs one command and writes the snapshot back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use certi_core::SystemClock;
use certi_engine::{CredentialAuthority, EngineConfig, EngineSnapshot};

pub struct StateContext {
    pub authority: CredentialAuthority,
    pub state_path: PathBuf,
}

impl StateContext {
    /// Load configuration from the environment. `state_override` replaces
    /// `CERTI_STATE_PATH`.
    pub fn open(state_override: Option<&Path>) -> Result<Self> {
        let mut config =
            EngineConfig::from_env().context("failed to load engine configuration")?;
        if let Some(path) = state_override {
            config.state_path = path.to_path_buf();
        }
        Self::open_with(&config)
    }

    pub fn open_with(config: &EngineConfig) -> Result<Self> {
        let snapshot = EngineSnapshot::load(&config.state_path).with_context(|| {
            format!("failed to load state from {}", config.state_path.display())
        })?;
        tracing::debug!(
            path = %config.state_path.display(),
            institutions = snapshot.institutions.len(),
            credentials = snapshot.credentials.len(),
            audit_entries = snapshot.audit.len(),
            "state loaded"
        );
        Ok(Self {
            authority: CredentialAuthority::restore(config, snapshot, Arc::new(SystemClock)),
            state_path: config.state_path.clone(),
        })
    }

    pub fn save(&self) -> Result<()> {
        let snapshot = self
            .authority
            .snapshot()
            .context("failed to capture state")?;
        snapshot
            .save(&self.state_path)
            .with_context(|| format!("failed to write state to {}", self.state_path.display()))?;
        tracing::debug!(path = %self.state_path.display(), "state saved");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use certi_crypto::MasterKey;

    pub fn config_in(dir: &Path) -> EngineConfig {
        let mut config = EngineConfig::new(MasterKey::from_bytes([9; 32]));
        config.state_path = dir.join("state.json");
        config
    }
}
