//! # certi-audit: Tamper-Evident Audit Trail
//!
//! Every lifecycle event (onboarding, rotation, issuance, revocation,
//! verification) is appended to a hash chain. There is one chain per
//! institution plus one global chain for events that have no institution
//! (for example a verification whose token could not be decoded).
//!
//! ## Chain Structure
//!
//! ```text
//! entry n:  log_hash = SHA256(JCS(entry_n without log_hash))
//!           previous_log_hash = entry_{n-1}.log_hash   (n > 1)
//!                             = "000…000" (64 zeros)    (n = 1)
//! ```
//!
//! Positions are 1-based and contiguous per chain. Appends to one chain are
//! serialized; different chains append concurrently.
//!
//! ## Integrity
//!
//! [`AuditChain::verify_chain_integrity`] replays a chain from genesis and
//! reports the first entry whose hash, linkage or position does not hold.
//! It never repairs anything.

pub mod chain;
pub mod entry;
pub mod error;
pub mod store;

pub use chain::{AuditChain, AuditQuery, ChainIntegrityReport};
pub use entry::{compute_log_hash, AuditEventType, AuditLogEntry, AuditRecord, GENESIS_HASH};
pub use error::AuditError;
pub use store::{AuditStore, ChainKey, InMemoryAuditStore};
