//! # certi-core: Foundational Types for CertiTrust
//!
//! This crate is the leaf of the CertiTrust workspace. It defines the
//! primitives every other crate builds on: the canonical byte encoding used
//! for anything that is hashed or signed, the SHA-256 content digest, UTC
//! timestamps with second precision, an injectable clock, and the identifier
//! newtypes for institutions, documents and actors.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every signed or chained record flows
//!    through `CanonicalBytes::new()`. Issuance and verification therefore
//!    share one encoder and cannot drift apart.
//!
//! 2. **UTC-only timestamps.** `Timestamp` is UTC with a `Z` suffix and
//!    seconds precision, matching the canonical encoding rules.
//!
//! 3. **Newtype identifiers.** An `InstitutionId` cannot be passed where a
//!    `DocumentId` is expected.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `certi-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{
    digests_equal, is_sha256_hex, sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm,
    SHA256_HEX_LEN,
};
pub use error::{CanonicalizationError, CertiError};
pub use identity::{ActorId, DocumentId, InstitutionId};
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
