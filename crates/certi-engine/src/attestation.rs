//! External attestation seam.
//!
//! An attestation service (for example a public ledger anchoring document
//! hashes) can corroborate a verification. Its answer is attached to the
//! result and never changes the verdict.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use certi_core::InstitutionId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttestationError {
    #[error("attestation service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationStatus {
    /// The service holds a matching record.
    Attested,
    /// The service answered and has no record.
    NotAttested,
    /// The service could not be consulted.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationReport {
    pub provider: String,
    pub status: AttestationStatus,
    /// Provider-specific reference, such as a transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub trait AttestationService: Send + Sync {
    fn provider_name(&self) -> &str;

    fn attest(
        &self,
        document_hash: &str,
        institution_id: &InstitutionId,
    ) -> Result<AttestationReport, AttestationError>;
}

/// Consult `service`, turning a failure into an `Unavailable` report.
pub(crate) fn consult(
    service: &dyn AttestationService,
    document_hash: &str,
    institution_id: &InstitutionId,
) -> AttestationReport {
    match service.attest(document_hash, institution_id) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(
                provider = service.provider_name(),
                institution = %institution_id,
                error = %err,
                "attestation lookup failed"
            );
            AttestationReport {
                provider: service.provider_name().to_string(),
                status: AttestationStatus::Unavailable,
                reference: None,
                detail: Some(err.to_string()),
            }
        }
    }
}
