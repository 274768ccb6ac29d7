//! # Fingerprint and Signature Properties
//!
//! Property tests across certi-crypto and certi-vc: fingerprints separate
//! inputs, page order matters, inclusion proofs hold for every page, and a
//! canonical payload signed by a key verifies under its public key and no
//! other.

use certi_core::{InstitutionId, Timestamp};
use certi_crypto::{
    find_tampered_pages, fingerprint, fingerprint_pages, Ed25519KeyPair, MerkleTree,
};
use certi_vc::{build_payload, sign, verify, CredentialPayload};
use proptest::prelude::*;

fn payload_for(document: &[u8], institution: &str) -> CredentialPayload {
    let hash = fingerprint(document);
    CredentialPayload {
        document_hash: hash.clone(),
        merkle_root: hash,
        institution_id: InstitutionId::new(institution).unwrap(),
        issued_at: Timestamp::parse("2026-05-05T05:05:05Z").unwrap(),
        document_type: "certificate".into(),
        expires_at: None,
    }
}

#[test]
fn single_page_root_is_the_page_fingerprint() {
    let (hashes, root) = fingerprint_pages(&[b"only page".as_slice()]);
    assert_eq!(hashes, vec![fingerprint(b"only page")]);
    assert_eq!(root, fingerprint(b"only page"));
}

#[test]
fn known_empty_fingerprint() {
    assert_eq!(
        fingerprint(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

proptest! {
    #[test]
    fn distinct_inputs_have_distinct_fingerprints(
        a in proptest::collection::vec(any::<u8>(), 0..256),
        b in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn swapping_two_distinct_pages_changes_the_root(
        pages in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..64), 2..8),
        i in any::<prop::sample::Index>(),
        j in any::<prop::sample::Index>(),
    ) {
        let (i, j) = (i.index(pages.len()), j.index(pages.len()));
        prop_assume!(pages[i] != pages[j]);
        let mut swapped = pages.clone();
        swapped.swap(i, j);
        prop_assert_ne!(fingerprint_pages(&pages).1, fingerprint_pages(&swapped).1);
    }

    #[test]
    fn every_page_has_a_valid_inclusion_proof(
        pages in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 1..12),
    ) {
        let (hashes, root) = fingerprint_pages(&pages);
        let tree = MerkleTree::new(&hashes).unwrap();
        prop_assert_eq!(tree.root(), root.as_str());
        for index in 0..hashes.len() {
            let proof = tree.proof(index).unwrap();
            prop_assert!(proof.verify());
        }
    }

    #[test]
    fn modified_page_is_the_only_one_reported(
        pages in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..32), 1..10),
        target in any::<prop::sample::Index>(),
    ) {
        let target = target.index(pages.len());
        let mut modified = pages.clone();
        modified[target].push(0xFF);
        let (original, _) = fingerprint_pages(&pages);
        let (current, _) = fingerprint_pages(&modified);
        prop_assert_eq!(find_tampered_pages(&original, &current), vec![target + 1]);
    }

    #[test]
    fn signature_verifies_only_under_the_signing_key(
        document in proptest::collection::vec(any::<u8>(), 0..128),
        seed_a in any::<[u8; 32]>(),
        seed_b in any::<[u8; 32]>(),
    ) {
        prop_assume!(seed_a != seed_b);
        let signer = Ed25519KeyPair::from_seed(&seed_a);
        let other = Ed25519KeyPair::from_seed(&seed_b);

        let bytes = build_payload(&payload_for(&document, "uon")).unwrap();
        let signature = sign(&bytes, &signer).to_base64();
        prop_assert!(verify(&bytes, &signature, &signer.public_key()));
        prop_assert!(!verify(&bytes, &signature, &other.public_key()));

        let moved = build_payload(&payload_for(&document, "ku")).unwrap();
        prop_assert!(!verify(&moved, &signature, &signer.public_key()));
    }
}
