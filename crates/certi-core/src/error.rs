//! # Error Types
//!
//! Errors shared across the CertiTrust crates. Each downstream crate defines
//! its own `thiserror` enum and wraps these where it needs to.

use thiserror::Error;

/// Top-level error for core primitives.
#[derive(Error, Debug)]
pub enum CertiError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A value failed structural validation (bad timestamp, bad identifier).
    #[error("validation error: {0}")]
    Validation(String),

    /// Content integrity violation.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
