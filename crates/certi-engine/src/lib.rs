//! # certi-engine: Credential Authority
//!
//! Ties the primitives together into the operations an issuing or
//! verifying party performs:
//!
//! - **Institution lifecycle** ([`authority`]): onboarding with an epoch-1
//!   key, key rotation, deactivation.
//! - **Issuance** ([`issuance`]): fingerprint, canonical payload, custody
//!   signature, stored record, audit entry, proof token.
//! - **Verification** ([`verification`]): the ordered pipeline from token
//!   decoding to signature check, always ending in exactly one
//!   [`ErrorCode`] and exactly one audit entry.
//! - **State** ([`store`], [`snapshot`]): store traits with in-memory
//!   implementations and a JSON snapshot for the CLI.
//!
//! Configuration comes from the environment ([`config`]).

pub mod attestation;
pub mod authority;
pub mod config;
pub mod error;
pub mod issuance;
pub mod result;
pub mod snapshot;
pub mod store;
pub mod verification;

pub use attestation::{AttestationError, AttestationReport, AttestationService, AttestationStatus};
pub use authority::{AuthorityBuilder, CredentialAuthority};
pub use config::EngineConfig;
pub use error::{AuthorityError, ConfigError, IssuanceError, StoreError};
pub use issuance::{IssuanceRequest, IssuedCredential, Issuer};
pub use result::{ErrorCode, VerificationResult};
pub use snapshot::{EngineSnapshot, SNAPSHOT_FORMAT};
pub use store::{
    CredentialStore, InMemoryCredentialStore, InMemoryInstitutionStore, InstitutionRecord,
    InstitutionStore,
};
pub use verification::{VerificationClaim, VerificationRequest, Verifier};
