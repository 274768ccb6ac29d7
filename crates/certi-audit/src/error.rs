use thiserror::Error;

/// Errors from audit chain operations.
#[derive(Error, Debug)]
pub enum AuditError {
    /// The backing store could not complete the operation.
    #[error("audit store unavailable: {0}")]
    Store(String),

    /// An entry was offered at a position other than the chain's next one.
    #[error("position conflict on chain {chain}: expected {expected}, got {actual}")]
    PositionConflict {
        chain: String,
        expected: u64,
        actual: u64,
    },

    /// Entry contents could not be canonicalized for hashing.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] certi_core::CanonicalizationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
