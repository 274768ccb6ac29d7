//! # Page Merkle Tree
//!
//! Commits to the ordered page hashes of a paginated document.
//!
//! ## Algorithm
//!
//! - Leaves are the page hashes themselves (64-char lowercase hex).
//! - Parent: `SHA256(left_hex || right_hex)` over the UTF-8 bytes of the two
//!   hex renderings.
//! - An odd trailing node is promoted to the next level unhashed.
//! - A single page is its own root; no extra hashing round is applied.
//!
//! Because the pairing is positional, swapping two distinct pages changes
//! the root.
//!
//! Proofs record the sibling at each level together with the side it sits
//! on. Levels where the node was promoted contribute no step.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ed25519::bytes_to_hex;
use crate::error::CryptoError;

/// Hash two child nodes into their parent.
pub fn hash_pair(left_hex: &str, right_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left_hex.as_bytes());
    hasher.update(right_hex.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Which side of the running hash a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sibling is the left child; the running hash is the right child.
    Left,
    /// Sibling is the right child.
    Right,
}

/// One level of an inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Position of the sibling.
    pub side: Side,
    /// Sibling hash (64 hex chars).
    pub hash: String,
}

/// Inclusion proof for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Zero-based page index.
    pub page_index: usize,
    /// The page hash being proven.
    pub leaf: String,
    /// Sibling path from leaf to root.
    pub path: Vec<ProofStep>,
    /// The root the path must reach.
    pub root: String,
}

impl MerkleProof {
    /// Recompute the root from the leaf and path. Returns `false` on any
    /// mismatch; never errors.
    pub fn verify(&self) -> bool {
        let mut current = self.leaf.to_ascii_lowercase();
        for step in &self.path {
            current = match step.side {
                Side::Left => hash_pair(&step.hash, &current),
                Side::Right => hash_pair(&current, &step.hash),
            };
        }
        current == self.root.to_ascii_lowercase()
    }
}

/// A fully materialized page tree. `levels[0]` holds the leaves and the last
/// level holds the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build a tree over ordered page hashes.
    ///
    /// # Errors
    ///
    /// Fails on an empty page list.
    pub fn new(page_hashes: &[String]) -> Result<Self, CryptoError> {
        if page_hashes.is_empty() {
            return Err(CryptoError::Merkle(
                "cannot build a tree over zero pages".into(),
            ));
        }
        let mut levels = vec![page_hashes.to_vec()];
        while let Some(level) = levels.last() {
            if level.len() <= 1 {
                break;
            }
            let next = next_level(level);
            levels.push(next);
        }
        Ok(Self { levels })
    }

    /// The root hash.
    pub fn root(&self) -> &str {
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The leaves, in page order.
    pub fn leaves(&self) -> &[String] {
        self.levels.first().map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of pages committed.
    pub fn page_count(&self) -> usize {
        self.leaves().len()
    }

    /// Inclusion proof for the page at zero-based `page_index`.
    pub fn proof(&self, page_index: usize) -> Result<MerkleProof, CryptoError> {
        let leaf = self.leaves().get(page_index).cloned().ok_or_else(|| {
            CryptoError::Merkle(format!(
                "page index {page_index} out of range for {} pages",
                self.page_count()
            ))
        })?;

        let mut path = Vec::new();
        let mut idx = page_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = idx ^ 1;
            if let Some(hash) = level.get(sibling) {
                let side = if sibling < idx { Side::Left } else { Side::Right };
                path.push(ProofStep {
                    side,
                    hash: hash.clone(),
                });
            }
            idx /= 2;
        }

        Ok(MerkleProof {
            page_index,
            leaf,
            path,
            root: self.root().to_string(),
        })
    }
}

/// Fold page hashes to a root without keeping intermediate levels.
///
/// Returns `None` for an empty list.
pub fn merkle_root(page_hashes: &[String]) -> Option<String> {
    let mut level: Vec<String> = page_hashes.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level.pop()
}

fn next_level(level: &[String]) -> Vec<String> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            promoted => promoted.concat(),
        })
        .collect()
}

/// Compare issued page hashes against recomputed ones and return the
/// 1-based page numbers that differ.
///
/// Pages present in only one of the two lists (added or removed pages) are
/// reported as tampered too.
pub fn find_tampered_pages(original: &[String], current: &[String]) -> Vec<usize> {
    let longest = original.len().max(current.len());
    (0..longest)
        .filter(|&i| match (original.get(i), current.get(i)) {
            (Some(a), Some(b)) => !a.eq_ignore_ascii_case(b),
            _ => true,
        })
        .map(|i| i + 1)
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use proptest::prelude::*;

    fn distinct_pages() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(any::<u64>(), 2..12).prop_map(|set| {
            set.into_iter()
                .map(|n| fingerprint(&n.to_be_bytes()))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn reversing_distinct_pages_changes_root(p in distinct_pages()) {
            let mut reversed = p.clone();
            reversed.reverse();
            prop_assert_ne!(merkle_root(&p), merkle_root(&reversed));
        }

        #[test]
        fn all_proofs_verify(p in distinct_pages()) {
            let tree = MerkleTree::new(&p).unwrap();
            for i in 0..p.len() {
                prop_assert!(tree.proof(i).unwrap().verify());
            }
        }

        #[test]
        fn replacing_any_page_changes_root(p in distinct_pages(), idx in any::<prop::sample::Index>()) {
            let i = idx.index(p.len());
            let mut forged = p.clone();
            forged[i] = fingerprint(b"replacement page");
            prop_assume!(forged[i] != p[i]);
            prop_assert_ne!(merkle_root(&p), merkle_root(&forged));
        }
    }
}
