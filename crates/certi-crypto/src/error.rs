//! # Cryptographic Error Types

use thiserror::Error;

/// Errors from signing, verification, hashing and encoding.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("Ed25519 verification failed: {0}")]
    VerificationFailed(String),

    /// Invalid Ed25519 signature encoding or length.
    #[error("invalid Ed25519 signature: {0}")]
    InvalidSignature(String),

    /// Invalid Ed25519 public key.
    #[error("invalid Ed25519 public key: {0}")]
    InvalidPublicKey(String),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(String),

    /// Merkle tree operation error.
    #[error("Merkle error: {0}")]
    Merkle(String),

    /// I/O error while streaming document bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from sealing, unsealing or using institution keys.
///
/// Every variant means the operation did not happen: no signature was
/// produced and no key was published.
#[derive(Error, Debug)]
pub enum KeyCustodyError {
    /// The master key is malformed.
    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    /// Encrypting a private key failed.
    #[error("sealing failed: {0}")]
    Seal(String),

    /// Decrypting a private key failed (wrong master key or tampered
    /// ciphertext).
    #[error("unsealing failed: {0}")]
    Unseal(String),

    /// The sealed record decoded but is not a usable key.
    #[error("corrupt key material: {0}")]
    CorruptKeyMaterial(String),

    /// The unsealed private key does not belong to the expected public key.
    #[error("unsealed key does not match public key {expected}")]
    KeyMismatch {
        /// Hex public key the caller expected.
        expected: String,
    },
}
