//! # CLI State Persistence
//!
//! Drives the `certi` command handlers across separate "invocations" (each
//! one reopening the state file) to check that keys, credentials and audit
//! chains survive the JSON snapshot.

use std::path::Path;

use certi_cli::audit::{run_audit, AuditArgs, AuditCommand};
use certi_cli::credential::{run_issue, run_revoke, run_verify, IssueArgs, RevokeArgs, VerifyArgs};
use certi_cli::institution::{run_institution, InstitutionArgs, InstitutionCommand};
use certi_cli::state::StateContext;
use certi_cli::{EXIT_OK, EXIT_REJECTED};
use certi_core::ActorId;
use certi_crypto::MasterKey;
use certi_engine::EngineConfig;

fn config(dir: &Path, master: [u8; 32]) -> EngineConfig {
    let mut config = EngineConfig::new(MasterKey::from_bytes(master));
    config.state_path = dir.join("certi-state.json");
    config
}

/// One CLI invocation: open, run, save.
fn invoke(config: &EngineConfig, f: impl FnOnce(&StateContext) -> anyhow::Result<u8>) -> u8 {
    let ctx = StateContext::open_with(config).unwrap();
    let code = f(&ctx).unwrap();
    ctx.save().unwrap();
    code
}

fn verify_args(document: &Path) -> VerifyArgs {
    VerifyArgs {
        document: document.to_path_buf(),
        token: None,
        pages: None,
        expected_hash: None,
    }
}

#[test]
fn credentials_survive_restarts_and_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), [7; 32]);
    let actor = || Some(ActorId::new("registrar@uon"));
    let document = dir.path().join("diploma.txt");
    std::fs::write(&document, "Master of Public Health").unwrap();

    invoke(&config, |ctx| {
        let args = InstitutionArgs {
            command: InstitutionCommand::Onboard {
                name: "University of Nairobi".into(),
                id: Some("uon".into()),
            },
        };
        run_institution(&args, ctx, actor())
    });

    let issue = IssueArgs {
        document: document.clone(),
        institution: "uon".into(),
        document_type: "degree".into(),
        pages: None,
        expires: None,
        out: None,
    };
    invoke(&config, |ctx| run_issue(&issue, ctx, actor()));

    invoke(&config, |ctx| {
        let args = InstitutionArgs {
            command: InstitutionCommand::Rotate { id: "uon".into() },
        };
        run_institution(&args, ctx, actor())
    });

    let code = invoke(&config, |ctx| run_verify(&verify_args(&document), ctx, None));
    assert_eq!(code, EXIT_OK);

    let verify_chains = AuditArgs {
        command: AuditCommand::Verify {
            institution: None,
            global: false,
        },
    };
    assert_eq!(invoke(&config, |ctx| run_audit(&verify_chains, ctx)), EXIT_OK);

    // onboarded, issued, rotated, verified
    let ctx = StateContext::open_with(&config).unwrap();
    let snapshot = ctx.authority.snapshot().unwrap();
    assert_eq!(snapshot.audit.len(), 4);
    assert_eq!(snapshot.credentials.len(), 1);
    assert_eq!(snapshot.institutions[0].key_ring.epochs().len(), 2);
}

#[test]
fn revocation_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), [8; 32]);
    let document = dir.path().join("cert.txt");
    std::fs::write(&document, "Certificate of Completion").unwrap();

    invoke(&config, |ctx| {
        ctx.authority.onboard_institution("Strathmore", None, None)?;
        Ok(EXIT_OK)
    });
    let ctx = StateContext::open_with(&config).unwrap();
    let institution = ctx.authority.institutions().unwrap()[0].institution_id.to_string();

    let issue = IssueArgs {
        document: document.clone(),
        institution,
        document_type: "certificate".into(),
        pages: None,
        expires: None,
        out: None,
    };
    invoke(&config, |ctx| run_issue(&issue, ctx, None));

    let ctx = StateContext::open_with(&config).unwrap();
    let document_id = ctx.authority.credentials(None).unwrap()[0].document_id.to_string();
    let revoke = RevokeArgs {
        document_id,
        reason: Some("issued in error".into()),
    };
    invoke(&config, |ctx| run_revoke(&revoke, ctx, None));

    let code = invoke(&config, |ctx| run_verify(&verify_args(&document), ctx, None));
    assert_eq!(code, EXIT_REJECTED);
}

#[test]
fn wrong_master_key_cannot_issue() {
    let dir = tempfile::tempdir().unwrap();
    let good = config(dir.path(), [1; 32]);
    let bad = config(dir.path(), [2; 32]);
    let document = dir.path().join("doc.txt");
    std::fs::write(&document, "x").unwrap();

    invoke(&good, |ctx| {
        ctx.authority
            .onboard_institution("JKUAT", Some(certi_core::InstitutionId::new("jkuat")?), None)?;
        Ok(EXIT_OK)
    });

    let issue = IssueArgs {
        document,
        institution: "jkuat".into(),
        document_type: "certificate".into(),
        pages: None,
        expires: None,
        out: None,
    };
    let ctx = StateContext::open_with(&bad).unwrap();
    assert!(run_issue(&issue, &ctx, None).is_err());
    assert!(ctx.authority.credentials(None).unwrap().is_empty());
}
