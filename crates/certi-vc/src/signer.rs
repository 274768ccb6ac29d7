//! # Credential Signer / Verifier
//!
//! Signing happens either with an in-memory key pair or, in production,
//! through a [`KeyCustody`] backend holding the sealed key of the current
//! epoch. Verification is a predicate: malformed signatures, malformed keys
//! and wrong keys all yield `false`.

use certi_core::CanonicalBytes;
use certi_crypto::ed25519::verify_with_public_key;
use certi_crypto::{
    Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, KeyCustody, KeyCustodyError, KeyEpoch,
};

/// Sign canonical payload bytes with a key pair.
pub fn sign(payload: &CanonicalBytes, key: &Ed25519KeyPair) -> Ed25519Signature {
    key.sign(payload)
}

/// Sign canonical payload bytes with the sealed key of `epoch`.
pub fn sign_with_custody(
    custody: &dyn KeyCustody,
    epoch: &KeyEpoch,
    payload: &CanonicalBytes,
) -> Result<Ed25519Signature, KeyCustodyError> {
    custody.sign(&epoch.sealed_key, &epoch.public_key, payload)
}

/// Verify a base64-encoded signature. Never panics or errors.
pub fn verify(payload: &CanonicalBytes, signature_b64: &str, public_key: &Ed25519PublicKey) -> bool {
    match Ed25519Signature::from_base64(signature_b64) {
        Ok(signature) => verify_signature(payload, &signature, public_key),
        Err(_) => false,
    }
}

/// Verify a decoded signature. Never panics or errors.
pub fn verify_signature(
    payload: &CanonicalBytes,
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> bool {
    verify_with_public_key(payload, signature, public_key).is_ok()
}
