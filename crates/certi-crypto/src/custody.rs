//! # Institution Key Custody
//!
//! Institution signing keys are generated inside the custody backend and
//! sealed immediately with AES-256-GCM under a process-wide master key. Only
//! the sealed record and the public key ever leave the backend. Signing
//! unseals the key inside a scoped operation and wipes it when that scope
//! ends.
//!
//! ## Backends
//!
//! - [`SoftwareKeyCustody`]: in-process AES-256-GCM envelope sealing. Used by
//!   the CLI and in tests.
//!
//! Other backends (an HSM, a cloud KMS) implement [`KeyCustody`] and are
//! injected as `Arc<dyn KeyCustody>`.
//!
//! ## Failure Semantics
//!
//! Every method fails closed with [`KeyCustodyError`]. A failed unseal never
//! produces a signature and a failed seal never produces a public key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use certi_core::CanonicalBytes;

use crate::ed25519::{bytes_to_hex, hex_to_bytes, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use crate::error::KeyCustodyError;

/// AES-GCM nonce size (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Domain separator for deriving the master key from a service secret.
pub const MASTER_KEY_DOMAIN: &[u8] = b"CertiTrust-KMS-v2";

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

/// The 256-bit key-encryption key. Wiped on drop; never printed.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; 32]>);

impl MasterKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse a 64-character hex key.
    pub fn from_hex(hex: &str) -> Result<Self, KeyCustodyError> {
        let hex = Zeroizing::new(hex.trim().to_ascii_lowercase());
        if hex.len() != 64 {
            return Err(KeyCustodyError::InvalidMasterKey(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }
        let bytes = Zeroizing::new(
            hex_to_bytes(&hex).map_err(|e| KeyCustodyError::InvalidMasterKey(e.to_string()))?,
        );
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    /// Derive a master key from an arbitrary service secret:
    /// `SHA256("CertiTrust-KMS-v2" || secret)`.
    pub fn derive_from_secret(secret: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(MASTER_KEY_DOMAIN);
        hasher.update(secret);
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&hasher.finalize());
        Self(key)
    }

    /// Fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        Self(key)
    }

    /// Hex rendering for export (`certi keygen-master`). The returned buffer
    /// is wiped on drop.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(bytes_to_hex(&self.0[..]))
    }

    fn cipher(&self) -> Result<Aes256Gcm, String> {
        Aes256Gcm::new_from_slice(&self.0[..]).map_err(|e| e.to_string())
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Sealed key record
// ---------------------------------------------------------------------------

/// An encrypted Ed25519 seed: base64 ciphertext (with GCM tag) and base64
/// nonce. Safe to persist.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    /// Base64 AES-256-GCM ciphertext including the authentication tag.
    pub ciphertext: String,
    /// Base64 96-bit nonce.
    pub nonce: String,
}

impl std::fmt::Debug for SealedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedKey")
            .field("ciphertext", &format_args!("<{} b64 chars>", self.ciphertext.len()))
            .field("nonce", &self.nonce)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// KeyCustody trait
// ---------------------------------------------------------------------------

/// A backend that creates institution keys and signs with them without
/// exposing private key material.
pub trait KeyCustody: Send + Sync {
    /// Generate a fresh Ed25519 key pair and return its public key and the
    /// sealed private key.
    fn generate_key_pair(&self) -> Result<(Ed25519PublicKey, SealedKey), KeyCustodyError>;

    /// Unseal `sealed`, check it belongs to `expected`, sign `data`, and wipe
    /// the unsealed key.
    fn sign(
        &self,
        sealed: &SealedKey,
        expected: &Ed25519PublicKey,
        data: &CanonicalBytes,
    ) -> Result<Ed25519Signature, KeyCustodyError>;

    /// Human-readable backend name for diagnostics.
    fn provider_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Software backend
// ---------------------------------------------------------------------------

/// AES-256-GCM envelope sealing with an in-process master key.
#[derive(Debug, Clone)]
pub struct SoftwareKeyCustody {
    master: MasterKey,
}

impl SoftwareKeyCustody {
    /// Create a backend sealing under `master`.
    pub fn new(master: MasterKey) -> Self {
        Self { master }
    }

    /// Seal a key pair's seed.
    fn seal(&self, pair: &Ed25519KeyPair) -> Result<SealedKey, KeyCustodyError> {
        let cipher = self.master.cipher().map_err(KeyCustodyError::Seal)?;
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let seed = pair.seed();
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), &seed[..])
            .map_err(|e| KeyCustodyError::Seal(e.to_string()))?;
        Ok(SealedKey {
            ciphertext: BASE64.encode(ciphertext),
            nonce: BASE64.encode(nonce_bytes),
        })
    }

    /// Run `f` with the unsealed key pair. The pair and every intermediate
    /// plaintext buffer are wiped before this returns.
    fn with_unsealed<R>(
        &self,
        sealed: &SealedKey,
        f: impl FnOnce(&Ed25519KeyPair) -> R,
    ) -> Result<R, KeyCustodyError> {
        let nonce = BASE64
            .decode(&sealed.nonce)
            .map_err(|e| KeyCustodyError::CorruptKeyMaterial(format!("nonce: {e}")))?;
        if nonce.len() != NONCE_SIZE {
            return Err(KeyCustodyError::CorruptKeyMaterial(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                nonce.len()
            )));
        }
        let ciphertext = BASE64
            .decode(&sealed.ciphertext)
            .map_err(|e| KeyCustodyError::CorruptKeyMaterial(format!("ciphertext: {e}")))?;

        let cipher = self.master.cipher().map_err(KeyCustodyError::Unseal)?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
                .map_err(|_| {
                    KeyCustodyError::Unseal("authentication failed (wrong master key or tampered ciphertext)".into())
                })?,
        );
        let mut seed = Zeroizing::new([0u8; 32]);
        if plaintext.len() != seed.len() {
            return Err(KeyCustodyError::CorruptKeyMaterial(format!(
                "unsealed seed must be 32 bytes, got {}",
                plaintext.len()
            )));
        }
        seed.copy_from_slice(&plaintext);
        let pair = Ed25519KeyPair::from_seed(&seed);
        Ok(f(&pair))
    }
}

impl KeyCustody for SoftwareKeyCustody {
    fn generate_key_pair(&self) -> Result<(Ed25519PublicKey, SealedKey), KeyCustodyError> {
        let pair = Ed25519KeyPair::generate();
        let sealed = self.seal(&pair)?;
        Ok((pair.public_key(), sealed))
    }

    fn sign(
        &self,
        sealed: &SealedKey,
        expected: &Ed25519PublicKey,
        data: &CanonicalBytes,
    ) -> Result<Ed25519Signature, KeyCustodyError> {
        self.with_unsealed(sealed, |pair| {
            if pair.public_key() != *expected {
                return Err(KeyCustodyError::KeyMismatch {
                    expected: expected.to_hex(),
                });
            }
            Ok(pair.sign(data))
        })?
    }

    fn provider_name(&self) -> &str {
        "SoftwareKeyCustody"
    }
}
