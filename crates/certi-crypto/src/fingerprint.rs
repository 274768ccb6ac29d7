//! # Document Fingerprints
//!
//! SHA-256 over raw document bytes, rendered as 64-character lowercase hex.
//! Unlike the digests in `certi-core`, these hash arbitrary bytes: the
//! document is not a structured record and has no canonical form other than
//! itself.
//!
//! A fingerprint is always recomputed from the presented bytes at
//! verification time and compared against the value committed at issuance.

use std::io::Read;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ed25519::bytes_to_hex;
use crate::error::CryptoError;
use crate::merkle::merkle_root;

/// Read buffer size for streaming fingerprints.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 of `bytes` as lowercase hex.
pub fn fingerprint(bytes: &[u8]) -> String {
    bytes_to_hex(&Sha256::digest(bytes))
}

/// SHA-256 of everything `reader` yields, read in 64 KiB chunks.
///
/// Produces the same value as [`fingerprint()`] over the concatenated
/// bytes. Only fails when the reader does.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> Result<String, CryptoError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(bytes_to_hex(&hasher.finalize()))
}

/// Hash each page and fold the hashes into a Merkle root.
///
/// An empty page list yields no page hashes and the fingerprint of empty
/// input as its root.
pub fn fingerprint_pages<P: AsRef<[u8]>>(pages: &[P]) -> (Vec<String>, String) {
    let page_hashes: Vec<String> = pages.iter().map(|p| fingerprint(p.as_ref())).collect();
    let root = merkle_root(&page_hashes).unwrap_or_else(|| fingerprint(&[]));
    (page_hashes, root)
}

/// The full fingerprint of a presented document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    /// SHA-256 over the raw document bytes.
    pub content_hash: String,
    /// Ordered per-page hashes. Empty for a non-paginated blob.
    pub page_hashes: Vec<String>,
    /// Root committing to `page_hashes`, or `content_hash` for a blob.
    pub merkle_root: String,
}

impl DocumentFingerprint {
    /// Fingerprint a non-paginated document. The blob is its own single
    /// page, so `merkle_root == content_hash`.
    pub fn of_blob(bytes: &[u8]) -> Self {
        let content_hash = fingerprint(bytes);
        Self {
            merkle_root: content_hash.clone(),
            content_hash,
            page_hashes: Vec::new(),
        }
    }

    /// Fingerprint a document whose pages are supplied as separate buffers
    /// (for example, rendered page images). An empty page list is treated as
    /// a blob.
    pub fn with_pages<P: AsRef<[u8]>>(bytes: &[u8], pages: &[P]) -> Self {
        if pages.is_empty() {
            return Self::of_blob(bytes);
        }
        let (page_hashes, merkle_root) = fingerprint_pages(pages);
        Self {
            content_hash: fingerprint(bytes),
            page_hashes,
            merkle_root,
        }
    }

    /// Fingerprint a document whose pages are byte ranges of the document
    /// itself.
    ///
    /// # Errors
    ///
    /// Fails if any range is reversed or extends past the end of `bytes`.
    pub fn with_page_ranges(bytes: &[u8], ranges: &[Range<usize>]) -> Result<Self, CryptoError> {
        let pages = ranges
            .iter()
            .map(|r| {
                bytes.get(r.clone()).ok_or_else(|| {
                    CryptoError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!(
                            "page range {}..{} outside document of {} bytes",
                            r.start,
                            r.end,
                            bytes.len()
                        ),
                    ))
                })
            })
            .collect::<Result<Vec<&[u8]>, _>>()?;
        Ok(Self::with_pages(bytes, &pages))
    }

    /// True when the document was fingerprinted page by page.
    pub fn is_paginated(&self) -> bool {
        !self.page_hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_input_vector() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn reader_matches_in_memory_across_chunk_boundary() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = fingerprint_reader(std::io::Cursor::new(&data)).unwrap();
        assert_eq!(streamed, fingerprint(&data));
    }

    #[test]
    fn reader_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
            }
        }
        assert!(matches!(fingerprint_reader(Broken), Err(CryptoError::Io(_))));
    }

    #[test]
    fn single_page_root_equals_page_fingerprint() {
        let (hashes, root) = fingerprint_pages(&[b"only page".as_slice()]);
        assert_eq!(hashes.len(), 1);
        assert_eq!(root, fingerprint(b"only page"));
    }

    #[test]
    fn empty_page_list_root() {
        let (hashes, root) = fingerprint_pages::<&[u8]>(&[]);
        assert!(hashes.is_empty());
        assert_eq!(root, fingerprint(b""));
    }

    #[test]
    fn blob_root_is_content_hash() {
        let fp = DocumentFingerprint::of_blob(b"transcript");
        assert_eq!(fp.merkle_root, fp.content_hash);
        assert!(!fp.is_paginated());
    }

    #[test]
    fn page_ranges_slice_the_document() {
        let doc = b"page-onepage-two";
        let fp = DocumentFingerprint::with_page_ranges(doc, &[0..8, 8..16]).unwrap();
        assert_eq!(fp.content_hash, fingerprint(doc));
        assert_eq!(fp.page_hashes, vec![fingerprint(b"page-one"), fingerprint(b"page-two")]);
        assert!(fp.is_paginated());
    }

    #[test]
    fn page_range_out_of_bounds_is_rejected() {
        assert!(DocumentFingerprint::with_page_ranges(b"short", &[0..10]).is_err());
    }

    #[test]
    fn empty_pages_fall_back_to_blob() {
        let fp = DocumentFingerprint::with_pages::<&[u8]>(b"doc", &[]);
        assert_eq!(fp, DocumentFingerprint::of_blob(b"doc"));
    }
}
