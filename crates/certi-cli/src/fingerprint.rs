//! # Fingerprint Subcommand
//!
//! Prints the content hash of a file. With `--pages`, also prints each page
//! hash and the Merkle root over them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use certi_crypto::{fingerprint_reader, DocumentFingerprint};

use crate::{parse_page_ranges, read_file, EXIT_OK};

/// Arguments for the `certi fingerprint` subcommand.
#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// File to fingerprint.
    pub file: PathBuf,

    /// Page byte ranges, e.g. `0..1200,1200..2400`.
    #[arg(long)]
    pub pages: Option<String>,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn run_fingerprint(args: &FingerprintArgs) -> Result<u8> {
    let fp = match &args.pages {
        Some(spec) => {
            let ranges = parse_page_ranges(spec)?;
            let bytes = read_file(&args.file)?;
            DocumentFingerprint::with_page_ranges(&bytes, &ranges)
                .context("page ranges do not fit the file")?
        }
        None => {
            let file = std::fs::File::open(&args.file)
                .with_context(|| format!("failed to open {}", args.file.display()))?;
            let content_hash = fingerprint_reader(std::io::BufReader::new(file))
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            DocumentFingerprint {
                merkle_root: content_hash.clone(),
                content_hash,
                page_hashes: Vec::new(),
            }
        }
    };

    if args.json {
        let out = json!({
            "file": args.file.display().to_string(),
            "content_hash": fp.content_hash,
            "merkle_root": fp.merkle_root,
            "page_hashes": fp.page_hashes,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("content_hash: {}", fp.content_hash);
        if fp.is_paginated() {
            println!("merkle_root:  {}", fp.merkle_root);
            for (i, hash) in fp.page_hashes.iter().enumerate() {
                println!("  page {:>3}: {hash}", i + 1);
            }
        }
    }
    Ok(EXIT_OK)
}
