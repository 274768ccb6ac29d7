//! # Credential Subcommands
//!
//! `issue`, `verify` and `revoke`. Proof tokens are exchanged as files: by
//! default `<document>.certi-token` next to the document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use certi_core::{ActorId, DocumentId, InstitutionId, Timestamp};
use certi_engine::{IssuanceRequest, VerificationRequest};

use crate::state::StateContext;
use crate::{parse_page_ranges, read_file, EXIT_OK, EXIT_REJECTED};

/// Suffix of the default token file.
pub const TOKEN_SUFFIX: &str = "certi-token";

/// Default token location for a document.
pub fn default_token_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_owned();
    name.push(".");
    name.push(TOKEN_SUFFIX);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// issue
// ---------------------------------------------------------------------------

/// Arguments for `certi issue`.
#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Document to issue a credential for.
    pub document: PathBuf,

    /// Issuing institution.
    #[arg(long)]
    pub institution: String,

    /// Credential type, e.g. `degree_certificate`.
    #[arg(long = "type", default_value = "certificate")]
    pub document_type: String,

    /// Page byte ranges, e.g. `0..1200,1200..2400`.
    #[arg(long)]
    pub pages: Option<String>,

    /// Expiry as RFC 3339, e.g. `2030-06-30T00:00:00Z`.
    #[arg(long)]
    pub expires: Option<String>,

    /// Where to write the proof token. Defaults to `<document>.certi-token`.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run_issue(args: &IssueArgs, ctx: &StateContext, actor: Option<ActorId>) -> Result<u8> {
    let institution_id = InstitutionId::new(args.institution.as_str())
        .with_context(|| format!("invalid institution id {:?}", args.institution))?;
    let document = read_file(&args.document)?;
    let ranges = args.pages.as_deref().map(parse_page_ranges).transpose()?;
    let expires_at = args
        .expires
        .as_deref()
        .map(Timestamp::parse_lenient)
        .transpose()
        .context("invalid --expires")?;

    let issued = ctx
        .authority
        .issue(IssuanceRequest {
            institution_id: &institution_id,
            document: &document,
            page_ranges: ranges.as_deref().unwrap_or(&[]),
            document_type: &args.document_type,
            expires_at,
            actor,
        })
        .context("issuance failed")?;

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| default_token_path(&args.document));
    std::fs::write(&out, &issued.encoded_token)
        .with_context(|| format!("failed to write token to {}", out.display()))?;

    println!("OK: issued credential {}", issued.record.document_id);
    println!("  document_hash: {}", issued.record.document_hash);
    println!("  key_epoch:     {}", issued.record.key_epoch);
    println!("  token:         {}", out.display());
    Ok(EXIT_OK)
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

/// Arguments for `certi verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Presented document.
    pub document: PathBuf,

    /// Proof token file. Defaults to `<document>.certi-token` if present.
    #[arg(long)]
    pub token: Option<PathBuf>,

    /// Page byte ranges of the presented document.
    #[arg(long)]
    pub pages: Option<String>,

    /// Hash the credential is expected to commit to.
    #[arg(long)]
    pub expected_hash: Option<String>,
}

/// Prints the JSON result. Exits [`EXIT_REJECTED`] unless the result is valid.
pub fn run_verify(args: &VerifyArgs, ctx: &StateContext, actor: Option<ActorId>) -> Result<u8> {
    let document = read_file(&args.document)?;
    let ranges = args.pages.as_deref().map(parse_page_ranges).transpose()?;
    let token = match &args.token {
        Some(path) => Some(read_file(path)?),
        None => {
            let path = default_token_path(&args.document);
            if path.is_file() {
                Some(read_file(&path)?)
            } else {
                None
            }
        }
    };

    let result = ctx.authority.verify_document(VerificationRequest {
        token: token.as_deref(),
        document: &document,
        page_ranges: ranges.as_deref().unwrap_or(&[]),
        expected_hash: args.expected_hash.as_deref(),
        actor,
    });

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.valid { EXIT_OK } else { EXIT_REJECTED })
}

// ---------------------------------------------------------------------------
// revoke
// ---------------------------------------------------------------------------

/// Arguments for `certi revoke`.
#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// Credential (document) identifier.
    pub document_id: String,

    #[arg(long)]
    pub reason: Option<String>,
}

pub fn run_revoke(args: &RevokeArgs, ctx: &StateContext, actor: Option<ActorId>) -> Result<u8> {
    let document_id: DocumentId = args
        .document_id
        .parse()
        .with_context(|| format!("invalid document id {:?}", args.document_id))?;
    let record = ctx
        .authority
        .revoke(&document_id, args.reason.clone(), actor)
        .context("revocation failed")?;
    println!(
        "OK: revoked {} issued by {}",
        record.document_id, record.institution_id
    );
    Ok(EXIT_OK)
}
