//! Errors from payload construction and credential handling.

use thiserror::Error;

/// Errors from building or validating credential payloads.
#[derive(Error, Debug)]
pub enum VcError {
    /// Canonicalization of the payload failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] certi_core::CanonicalizationError),

    /// A payload field is structurally invalid.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
