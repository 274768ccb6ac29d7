//! # Engine Error Types
//!
//! Operational failures of the authority. Verification outcomes are not
//! errors: they are reported through [`crate::VerificationResult`].

use thiserror::Error;

use certi_audit::AuditError;
use certi_core::{DocumentId, InstitutionId};
use certi_crypto::{CryptoError, KeyCustodyError};
use certi_vc::VcError;

/// Errors from institution and credential persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("record already exists: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A state snapshot has an unexpected format tag.
    #[error("unsupported state format {found:?}, expected {expected:?}")]
    UnsupportedFormat { expected: String, found: String },
}

/// Errors from loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither `CERTI_MASTER_KEY_HEX` nor `CERTI_MASTER_SECRET` is set.
    #[error("no master key configured: set CERTI_MASTER_KEY_HEX or CERTI_MASTER_SECRET")]
    MissingMasterKey,

    #[error("invalid master key: {0}")]
    InvalidMasterKey(#[from] KeyCustodyError),

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors that abort credential issuance. Nothing is stored or audited when
/// issuance fails before signing.
#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("institution not found: {0}")]
    InstitutionNotFound(InstitutionId),

    #[error("institution is deactivated: {0}")]
    InstitutionInactive(InstitutionId),

    #[error("document could not be fingerprinted: {0}")]
    Fingerprint(#[from] CryptoError),

    #[error("invalid credential payload: {0}")]
    InvalidPayload(#[from] VcError),

    #[error("key custody failure: {0}")]
    Custody(#[from] KeyCustodyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("audit append failed: {0}")]
    Audit(#[from] AuditError),
}

/// Errors from authority operations other than verification.
#[derive(Error, Debug)]
pub enum AuthorityError {
    #[error("institution already exists: {0}")]
    InstitutionExists(InstitutionId),

    #[error("institution not found: {0}")]
    InstitutionNotFound(InstitutionId),

    #[error("institution is deactivated: {0}")]
    InstitutionInactive(InstitutionId),

    #[error("credential not found: {0}")]
    CredentialNotFound(DocumentId),

    #[error("credential already revoked: {0}")]
    AlreadyRevoked(DocumentId),

    #[error("invalid institution name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Issuance(#[from] IssuanceError),

    #[error("key custody failure: {0}")]
    Custody(#[from] KeyCustodyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("audit failure: {0}")]
    Audit(#[from] AuditError),
}
