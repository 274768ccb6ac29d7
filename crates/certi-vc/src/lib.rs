//! # certi-vc: Document Credentials
//!
//! Everything that turns a fingerprint into a verifiable credential and back:
//!
//! - **Payload** (`payload.rs`): the signed record and its one canonical
//!   byte encoding, shared by issuance and verification.
//! - **Signer** (`signer.rs`): Ed25519 signing through key custody and
//!   verification that answers `true`/`false` and never errors.
//! - **Token** (`token.rs`): the compact proof token embedded alongside the
//!   document, in a W3C-VC-like JSON envelope.
//! - **Credential** (`credential.rs`): the issuer-side record of an issued
//!   credential and its revocation state.
//!
//! ## Security Invariant
//!
//! [`build_payload()`] is the only function that produces signable bytes.
//! A token never carries the payload bytes themselves: the verifier rebuilds
//! them from the token's fields through the same function.

pub mod credential;
pub mod error;
pub mod payload;
pub mod signer;
pub mod token;

pub use credential::{CredentialRecord, CredentialStatus};
pub use error::VcError;
pub use payload::{build_payload, CredentialPayload, PAYLOAD_SCHEMA};
pub use signer::{sign, sign_with_custody, verify, verify_signature};
pub use token::{ProofToken, TokenDecodeError};
