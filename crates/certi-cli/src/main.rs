//! # certi CLI entry point
//!
//! Parses command-line arguments, initialises logging and dispatches to
//! subcommand handlers. Stateful commands load the state snapshot first and
//! write it back afterwards, including after a rejected verification (its
//! audit entry is part of the state).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use certi_cli::audit::{run_audit, AuditArgs};
use certi_cli::credential::{run_issue, run_revoke, run_verify, IssueArgs, RevokeArgs, VerifyArgs};
use certi_cli::fingerprint::{run_fingerprint, FingerprintArgs};
use certi_cli::institution::{run_institution, InstitutionArgs};
use certi_cli::keys::{run_keygen, KeygenArgs};
use certi_cli::state::StateContext;
use certi_cli::EXIT_ERROR;
use certi_core::ActorId;

/// CertiTrust credential tool.
///
/// Issues tamper-evident document credentials signed by institution keys
/// and verifies presented documents against their proof tokens.
#[derive(Parser, Debug)]
#[command(name = "certi", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// State file. Overrides `CERTI_STATE_PATH`.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Actor recorded in audit entries.
    #[arg(long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the content hash (and page Merkle root) of a file.
    Fingerprint(FingerprintArgs),

    /// Institution onboarding, key rotation and deactivation.
    Institution(InstitutionArgs),

    /// Issue a credential for a document.
    Issue(IssueArgs),

    /// Verify a document against its proof token.
    Verify(VerifyArgs),

    /// Revoke a credential.
    Revoke(RevokeArgs),

    /// Inspect and verify the audit trail.
    Audit(AuditArgs),

    /// Generate a fresh master key.
    KeygenMaster(KeygenArgs),
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let actor = cli.actor.map(ActorId::new);
    let state = cli.state;
    let with_state = |command: &dyn Fn(&StateContext) -> anyhow::Result<u8>| {
        let ctx = StateContext::open(state.as_deref())?;
        let code = command(&ctx)?;
        ctx.save()?;
        Ok::<u8, anyhow::Error>(code)
    };

    match &cli.command {
        Commands::Fingerprint(args) => run_fingerprint(args),
        Commands::KeygenMaster(args) => run_keygen(args),
        Commands::Institution(args) => {
            with_state(&|ctx| run_institution(args, ctx, actor.clone()))
        }
        Commands::Issue(args) => with_state(&|ctx| run_issue(args, ctx, actor.clone())),
        Commands::Verify(args) => with_state(&|ctx| run_verify(args, ctx, actor.clone())),
        Commands::Revoke(args) => with_state(&|ctx| run_revoke(args, ctx, actor.clone())),
        Commands::Audit(args) => with_state(&|ctx| run_audit(args, ctx)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);
    tracing::debug!("certi CLI starting");

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certi_cli::audit::AuditCommand;
    use certi_cli::institution::InstitutionCommand;

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "certi",
            "-vv",
            "--log-format",
            "json",
            "--state",
            "/tmp/s.json",
            "--actor",
            "registrar",
            "audit",
            "verify",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(cli.actor.as_deref(), Some("registrar"));
        assert!(matches!(
            cli.command,
            Commands::Audit(AuditArgs {
                command: AuditCommand::Verify { .. }
            })
        ));
    }

    #[test]
    fn parse_institution_onboard() {
        let cli = Cli::try_parse_from([
            "certi", "institution", "onboard", "--name", "Uni", "--id", "uni",
        ])
        .unwrap();
        if let Commands::Institution(InstitutionArgs {
            command: InstitutionCommand::Onboard { name, id },
        }) = cli.command
        {
            assert_eq!(name, "Uni");
            assert_eq!(id.as_deref(), Some("uni"));
        } else {
            panic!("expected institution onboard");
        }
    }

    #[test]
    fn parse_issue_and_verify() {
        let cli = Cli::try_parse_from([
            "certi",
            "issue",
            "diploma.pdf",
            "--institution",
            "uni",
            "--type",
            "degree",
            "--pages",
            "0..10,10..20",
        ])
        .unwrap();
        if let Commands::Issue(args) = cli.command {
            assert_eq!(args.document, PathBuf::from("diploma.pdf"));
            assert_eq!(args.document_type, "degree");
            assert_eq!(args.pages.as_deref(), Some("0..10,10..20"));
        } else {
            panic!("expected issue");
        }

        let cli = Cli::try_parse_from(["certi", "verify", "diploma.pdf", "--expected-hash", "ab"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Verify(_)));
    }

    #[test]
    fn parse_rejects_conflicting_chain_selectors() {
        assert!(Cli::try_parse_from([
            "certi", "audit", "list", "--institution", "x", "--global"
        ])
        .is_err());
    }

    #[test]
    fn parse_keygen() {
        let cli = Cli::try_parse_from(["certi", "keygen-master", "--export"]).unwrap();
        assert!(matches!(cli.command, Commands::KeygenMaster(KeygenArgs { export: true })));
    }
}
