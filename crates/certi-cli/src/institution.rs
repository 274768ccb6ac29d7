//! # Institution Subcommand
//!
//! - `onboard`: register an institution with an epoch-1 signing key.
//! - `rotate`: rotate its signing key; earlier epochs stay verify-only.
//! - `deactivate`: permanently disable it.
//! - `list`: show every institution and its key epochs.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use certi_core::{ActorId, InstitutionId};

use crate::state::StateContext;
use crate::EXIT_OK;

/// Arguments for the `certi institution` subcommand.
#[derive(Args, Debug)]
pub struct InstitutionArgs {
    #[command(subcommand)]
    pub command: InstitutionCommand,
}

#[derive(Subcommand, Debug)]
pub enum InstitutionCommand {
    /// Onboard a new institution.
    Onboard {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Identifier; generated when omitted.
        #[arg(long)]
        id: Option<String>,
    },

    /// Rotate the institution's signing key.
    Rotate {
        #[arg(long)]
        id: String,
    },

    /// Permanently deactivate the institution.
    Deactivate {
        #[arg(long)]
        id: String,
    },

    /// List institutions.
    List {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn institution_id(raw: &str) -> Result<InstitutionId> {
    InstitutionId::new(raw).with_context(|| format!("invalid institution id {raw:?}"))
}

pub fn run_institution(
    args: &InstitutionArgs,
    ctx: &StateContext,
    actor: Option<ActorId>,
) -> Result<u8> {
    let authority = &ctx.authority;
    match &args.command {
        InstitutionCommand::Onboard { name, id } => {
            let id = id.as_deref().map(institution_id).transpose()?;
            let record = authority
                .onboard_institution(name, id, actor)
                .context("onboarding failed")?;
            println!(
                "OK: onboarded {} ({}) with key epoch 1",
                record.institution_id, record.name
            );
            println!(
                "  public key: {}",
                record.key_ring.current().public_key.to_hex()
            );
        }

        InstitutionCommand::Rotate { id } => {
            let id = institution_id(id)?;
            let epoch = authority
                .rotate_key(&id, actor)
                .context("key rotation failed")?;
            println!("OK: {id} now signs with key epoch {}", epoch.epoch);
            println!("  public key: {}", epoch.public_key.to_hex());
        }

        InstitutionCommand::Deactivate { id } => {
            let id = institution_id(id)?;
            authority
                .deactivate_institution(&id, actor)
                .context("deactivation failed")?;
            println!("OK: deactivated {id}");
        }

        InstitutionCommand::List { json } => {
            let institutions = authority.institutions()?;
            if *json {
                let out: Vec<_> = institutions
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "institution_id": r.institution_id,
                            "name": r.name,
                            "is_active": r.is_active,
                            "created_at": r.created_at,
                            "key_rotated_at": r.key_rotated_at(),
                            "current_key_epoch": r.key_ring.current().epoch,
                            "public_key": r.key_ring.current().public_key.to_hex(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else if institutions.is_empty() {
                println!("No institutions.");
            } else {
                for r in &institutions {
                    let status = if r.is_active { "active" } else { "deactivated" };
                    println!("{}  {}  [{status}]", r.institution_id, r.name);
                    for epoch in r.key_ring.epochs() {
                        let until = epoch
                            .valid_until
                            .map(|t| t.to_string())
                            .unwrap_or_else(|| "current".to_string());
                        println!(
                            "    epoch {}: {} .. {until}  {}",
                            epoch.epoch,
                            epoch.valid_from,
                            epoch.public_key.to_hex()
                        );
                    }
                }
            }
        }
    }
    Ok(EXIT_OK)
}
