//! # Engine Configuration
//!
//! Read from the environment:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `CERTI_MASTER_KEY_HEX` | 64 hex chars, the AES-256 master key |
//! | `CERTI_MASTER_SECRET` | service secret the master key is derived from |
//! | `CERTI_FOLD_EXPIRED_INTO_REVOKED` | `true`/`false`, default `false` |
//! | `CERTI_STATE_PATH` | CLI state file, default `./certi-state.json` |
//!
//! `CERTI_MASTER_KEY_HEX` wins when both key variables are set.

use std::path::PathBuf;

use certi_crypto::MasterKey;

use crate::error::ConfigError;

pub const ENV_MASTER_KEY_HEX: &str = "CERTI_MASTER_KEY_HEX";
pub const ENV_MASTER_SECRET: &str = "CERTI_MASTER_SECRET";
pub const ENV_FOLD_EXPIRED: &str = "CERTI_FOLD_EXPIRED_INTO_REVOKED";
pub const ENV_STATE_PATH: &str = "CERTI_STATE_PATH";

/// Default location of the CLI state snapshot.
pub const DEFAULT_STATE_PATH: &str = "./certi-state.json";

/// Runtime configuration of a [`crate::CredentialAuthority`].
#[derive(Clone)]
pub struct EngineConfig {
    /// Key-encryption key for institution signing keys.
    pub master_key: MasterKey,
    /// Report expired credentials as `DOCUMENT_REVOKED`.
    pub fold_expired_into_revoked: bool,
    pub state_path: PathBuf,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("master_key", &"<redacted>")
            .field("fold_expired_into_revoked", &self.fold_expired_into_revoked)
            .field("state_path", &self.state_path)
            .finish()
    }
}

impl EngineConfig {
    /// Defaults around an explicit master key.
    pub fn new(master_key: MasterKey) -> Self {
        Self {
            master_key,
            fold_expired_into_revoked: false,
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let master_key = match (non_empty(ENV_MASTER_KEY_HEX), non_empty(ENV_MASTER_SECRET)) {
            (Some(hex), _) => MasterKey::from_hex(&hex)?,
            (None, Some(secret)) => MasterKey::derive_from_secret(secret.as_bytes()),
            (None, None) => return Err(ConfigError::MissingMasterKey),
        };

        let fold_expired_into_revoked = match non_empty(ENV_FOLD_EXPIRED) {
            None => false,
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::InvalidValue {
                var: ENV_FOLD_EXPIRED,
                value: v.clone(),
                reason: "expected true or false".into(),
            })?,
        };

        let state_path = non_empty(ENV_STATE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));

        Ok(Self {
            master_key,
            fold_expired_into_revoked,
            state_path,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_master_key_is_an_error() {
        let err = EngineConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingMasterKey));
    }

    #[test]
    fn hex_key_is_used_verbatim() {
        let hex = "42".repeat(32);
        let cfg = EngineConfig::from_lookup(lookup(&[(ENV_MASTER_KEY_HEX, &hex)])).unwrap();
        assert_eq!(cfg.master_key.to_hex().as_str(), hex);
        assert!(!cfg.fold_expired_into_revoked);
        assert_eq!(cfg.state_path, PathBuf::from(DEFAULT_STATE_PATH));
    }

    #[test]
    fn hex_key_wins_over_secret() {
        let hex = "42".repeat(32);
        let cfg = EngineConfig::from_lookup(lookup(&[
            (ENV_MASTER_KEY_HEX, &hex),
            (ENV_MASTER_SECRET, "service-secret"),
        ]))
        .unwrap();
        assert_eq!(cfg.master_key.to_hex().as_str(), hex);
    }

    #[test]
    fn secret_derives_key() {
        let cfg = EngineConfig::from_lookup(lookup(&[(ENV_MASTER_SECRET, "service-secret")])).unwrap();
        let expected = MasterKey::derive_from_secret(b"service-secret");
        assert_eq!(cfg.master_key.to_hex(), expected.to_hex());
    }

    #[test]
    fn malformed_hex_key_is_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[(ENV_MASTER_KEY_HEX, "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMasterKey(_)));
    }

    #[test]
    fn fold_flag_and_state_path() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            (ENV_MASTER_SECRET, "s"),
            (ENV_FOLD_EXPIRED, "TRUE"),
            (ENV_STATE_PATH, "/var/lib/certi/state.json"),
        ]))
        .unwrap();
        assert!(cfg.fold_expired_into_revoked);
        assert_eq!(cfg.state_path, PathBuf::from("/var/lib/certi/state.json"));

        let err = EngineConfig::from_lookup(lookup(&[
            (ENV_MASTER_SECRET, "s"),
            (ENV_FOLD_EXPIRED, "sometimes"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: ENV_FOLD_EXPIRED, .. }));
    }

    #[test]
    fn debug_redacts_master_key() {
        let hex = "42".repeat(32);
        let cfg = EngineConfig::from_lookup(lookup(&[(ENV_MASTER_KEY_HEX, &hex)])).unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains(&hex));
        assert!(debug.contains("<redacted>"));
    }
}
