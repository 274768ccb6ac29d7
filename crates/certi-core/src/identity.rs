//! # Identifier Newtypes
//!
//! Institutions, documents and actors each get their own type, so an
//! institution identifier cannot be passed where a document identifier is
//! expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CertiError;

/// Maximum accepted length of an institution identifier.
pub const MAX_INSTITUTION_ID_LEN: usize = 128;

/// Identifier of an issuing institution.
///
/// Institutions are onboarded with either a caller-chosen slug (for example
/// `"univ-lagos"`) or a generated UUID string. The value is embedded in
/// signed payloads and proof tokens, so it must be non-empty, printable and
/// free of whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstitutionId(String);

impl InstitutionId {
    /// Validate and wrap an identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, CertiError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CertiError::Validation(
                "institution id must not be empty".into(),
            ));
        }
        if id.len() > MAX_INSTITUTION_ID_LEN {
            return Err(CertiError::Validation(format!(
                "institution id exceeds {MAX_INSTITUTION_ID_LEN} bytes"
            )));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CertiError::Validation(format!(
                "institution id {id:?} contains whitespace or control characters"
            )));
        }
        Ok(Self(id))
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InstitutionId {
    type Error = CertiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstitutionId> for String {
    fn from(id: InstitutionId) -> Self {
        id.0
    }
}

impl std::str::FromStr for InstitutionId {
    type Err = CertiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an issued credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Generate a new random document identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for DocumentId {
    type Err = CertiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CertiError::Validation(format!("invalid document id {s:?}: {e}")))
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Free-form identifier of whoever triggered an audited action (an operator
/// account, a verifier kiosk, the CLI user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    /// Wrap an actor identifier.
    pub fn new(actor: impl Into<String>) -> Self {
        Self(actor.into())
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
