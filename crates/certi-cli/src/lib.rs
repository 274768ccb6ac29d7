//! # certi-cli: CertiTrust Command-Line Tool
//!
//! Provides the `certi` command-line interface over the credential
//! authority. State (institutions, credentials, audit chains) lives in a
//! JSON snapshot between invocations; see [`state`].
//!
//! ## Subcommands
//!
//! - `certi fingerprint`: content hash, page hashes and Merkle root of a file.
//! - `certi institution`: onboard, rotate, deactivate, list.
//! - `certi issue`: issue a credential and write its proof token.
//! - `certi verify`: run the verification pipeline, print the JSON result.
//! - `certi revoke`: revoke a credential.
//! - `certi audit`: list audit entries, verify chain integrity.
//! - `certi keygen-master`: generate a fresh master key.
//!
//! ## Exit Codes
//!
//! `0` success, `1` operational error, `2` verification failure or broken
//! audit chain.

pub mod audit;
pub mod credential;
pub mod fingerprint;
pub mod institution;
pub mod keys;
pub mod state;

use std::ops::Range;

use anyhow::{bail, Context, Result};

pub const EXIT_OK: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_REJECTED: u8 = 2;

/// Parse page byte ranges written as `START..END[,START..END...]`.
pub fn parse_page_ranges(spec: &str) -> Result<Vec<Range<usize>>> {
    let mut ranges = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = part
            .split_once("..")
            .with_context(|| format!("page range {part:?} is not START..END"))?;
        let start: usize = start
            .trim()
            .parse()
            .with_context(|| format!("invalid page start in {part:?}"))?;
        let end: usize = end
            .trim()
            .parse()
            .with_context(|| format!("invalid page end in {part:?}"))?;
        if end < start {
            bail!("page range {part:?} ends before it starts");
        }
        ranges.push(start..end);
    }
    if ranges.is_empty() {
        bail!("no page ranges given");
    }
    Ok(ranges)
}

/// Read a whole file with the path in the error.
pub(crate) fn read_file(path: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ranges() {
        assert_eq!(parse_page_ranges("0..4, 4..10").unwrap(), vec![0..4, 4..10]);
        assert_eq!(parse_page_ranges("3..3").unwrap(), vec![3..3]);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(parse_page_ranges("").is_err());
        assert!(parse_page_ranges("4").is_err());
        assert!(parse_page_ranges("a..4").is_err());
        assert!(parse_page_ranges("9..4").is_err());
    }

    #[test]
    fn read_file_names_the_path() {
        let err = read_file(std::path::Path::new("/nonexistent/certi/doc.pdf")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/certi/doc.pdf"));
    }
}
