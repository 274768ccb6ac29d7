//! # certi-crypto: Cryptographic Primitives
//!
//! Provides the cryptographic building blocks for CertiTrust:
//!
//! - **Fingerprints**: SHA-256 content hashes over raw document bytes, in
//!   memory or streamed from any reader.
//! - **Page Merkle trees**: a root committing to ordered page hashes, with
//!   inclusion proofs and tamper localization.
//! - **Ed25519** signing and verification over `CanonicalBytes`.
//! - **Key custody**: institution signing keys sealed at rest with
//!   AES-256-GCM under a process-wide master key, plus the versioned key
//!   ring that keeps retired public keys resolvable after rotation.
//!
//! ## Crate Policy
//!
//! - Depends only on `certi-core` internally.
//! - No mocking of cryptographic operations in tests: all tests use real
//!   SHA-256, real AES-GCM, real Ed25519.
//! - Private key bytes never appear in `Debug` output or logs.

pub mod custody;
pub mod ed25519;
pub mod error;
pub mod fingerprint;
pub mod keyring;
pub mod merkle;

pub use custody::{KeyCustody, MasterKey, SealedKey, SoftwareKeyCustody};
pub use ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::{CryptoError, KeyCustodyError};
pub use fingerprint::{fingerprint, fingerprint_pages, fingerprint_reader, DocumentFingerprint};
pub use keyring::{InstitutionKeyRing, KeyEpoch};
pub use merkle::{find_tampered_pages, hash_pair, merkle_root, MerkleProof, MerkleTree, ProofStep, Side};
