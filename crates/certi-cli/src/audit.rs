//! # Audit Subcommand
//!
//! - `list`: query entries, newest first.
//! - `verify`: replay one chain, or every chain, from genesis.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};

use certi_audit::{AuditEventType, AuditQuery, ChainKey};
use certi_core::InstitutionId;

use crate::state::StateContext;
use crate::{EXIT_OK, EXIT_REJECTED};

/// Arguments for the `certi audit` subcommand.
#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// List audit entries, newest first.
    List {
        /// Restrict to one institution's chain.
        #[arg(long, conflicts_with = "global")]
        institution: Option<String>,
        /// Restrict to the global chain.
        #[arg(long)]
        global: bool,
        /// Filter by event type, e.g. `document_verified`.
        #[arg(long)]
        event_type: Option<String>,
        /// Filter by document hash.
        #[arg(long)]
        document_hash: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Verify chain integrity. Without `--institution`, every chain.
    Verify {
        #[arg(long, conflicts_with = "global")]
        institution: Option<String>,
        /// Verify the global chain only.
        #[arg(long)]
        global: bool,
    },
}

fn chain_key(institution: Option<&str>, global: bool) -> Result<Option<ChainKey>> {
    match (institution, global) {
        (Some(raw), _) => {
            let id = InstitutionId::new(raw)
                .with_context(|| format!("invalid institution id {raw:?}"))?;
            Ok(Some(Some(id)))
        }
        (None, true) => Ok(Some(None)),
        (None, false) => Ok(None),
    }
}

fn label(chain: &ChainKey) -> String {
    match chain {
        Some(id) => id.to_string(),
        None => "<global>".to_string(),
    }
}

pub fn run_audit(args: &AuditArgs, ctx: &StateContext) -> Result<u8> {
    let audit = ctx.authority.audit();
    match &args.command {
        AuditCommand::List {
            institution,
            global,
            event_type,
            document_hash,
            limit,
            offset,
        } => {
            let event_type = event_type
                .as_deref()
                .map(str::parse::<AuditEventType>)
                .transpose()
                .map_err(|e| anyhow!(e))?;
            let entries = audit.query(&AuditQuery {
                chain: chain_key(institution.as_deref(), *global)?,
                event_type,
                document_hash: document_hash.clone(),
                limit: Some(*limit),
                offset: *offset,
            })?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(EXIT_OK)
        }

        AuditCommand::Verify {
            institution,
            global,
        } => {
            let reports = match chain_key(institution.as_deref(), *global)? {
                Some(chain) => {
                    let report = audit.verify_chain_integrity(&chain)?;
                    vec![(chain, report)]
                }
                None => audit.verify_all()?,
            };

            let mut all_valid = true;
            for (chain, report) in &reports {
                if report.valid {
                    println!(
                        "OK: chain {} intact ({} entries)",
                        label(chain),
                        report.entries_checked
                    );
                } else {
                    all_valid = false;
                    println!(
                        "BROKEN: chain {} at position {}: {}",
                        label(chain),
                        report.broken_position.unwrap_or_default(),
                        report.reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            if reports.is_empty() {
                println!("No audit chains.");
            }
            Ok(if all_valid { EXIT_OK } else { EXIT_REJECTED })
        }
    }
}
