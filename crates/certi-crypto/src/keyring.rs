//! # Versioned Institution Key Ring
//!
//! Each institution owns an ordered list of key epochs. Exactly one epoch is
//! current (open-ended `valid_until`) and signs new credentials. Rotation
//! closes the current epoch and opens the next; closed epochs stay in the
//! ring so that credentials issued under them keep verifying.
//!
//! Epochs are numbered from 1. Nothing is ever removed from the ring.

use serde::{Deserialize, Serialize};

use certi_core::Timestamp;

use crate::custody::SealedKey;
use crate::ed25519::Ed25519PublicKey;

/// One version of an institution's signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEpoch {
    /// 1-based epoch number.
    pub epoch: u32,
    /// Public key for this epoch.
    pub public_key: Ed25519PublicKey,
    /// Sealed private key. Only the current epoch's is ever unsealed.
    pub sealed_key: SealedKey,
    /// Start of the validity window (inclusive).
    pub valid_from: Timestamp,
    /// End of the validity window (inclusive). `None` while current.
    pub valid_until: Option<Timestamp>,
}

impl KeyEpoch {
    /// True while this epoch may sign new credentials.
    pub fn is_current(&self) -> bool {
        self.valid_until.is_none()
    }

    /// True if a credential issued at `at` may have been signed under this
    /// epoch.
    pub fn covers(&self, at: Timestamp) -> bool {
        self.valid_from <= at && self.valid_until.map_or(true, |until| at <= until)
    }
}

/// All key epochs of one institution, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKeyRing")]
pub struct InstitutionKeyRing {
    epochs: Vec<KeyEpoch>,
}

#[derive(Deserialize)]
struct RawKeyRing {
    epochs: Vec<KeyEpoch>,
}

impl TryFrom<RawKeyRing> for InstitutionKeyRing {
    type Error = String;

    fn try_from(raw: RawKeyRing) -> Result<Self, Self::Error> {
        if raw.epochs.is_empty() {
            return Err("key ring has no epochs".into());
        }
        for (i, epoch) in raw.epochs.iter().enumerate() {
            if epoch.epoch as usize != i + 1 {
                return Err(format!("key epoch {} found at position {}", epoch.epoch, i + 1));
            }
            let is_last = i + 1 == raw.epochs.len();
            if epoch.is_current() != is_last {
                return Err(format!("key epoch {} has an inconsistent validity window", epoch.epoch));
            }
        }
        Ok(Self { epochs: raw.epochs })
    }
}

impl InstitutionKeyRing {
    /// Start a ring with epoch 1.
    pub fn new(public_key: Ed25519PublicKey, sealed_key: SealedKey, now: Timestamp) -> Self {
        Self {
            epochs: vec![KeyEpoch {
                epoch: 1,
                public_key,
                sealed_key,
                valid_from: now,
                valid_until: None,
            }],
        }
    }

    /// The epoch that signs new credentials.
    pub fn current(&self) -> &KeyEpoch {
        // The ring is never empty: `new` seeds it and nothing removes epochs.
        &self.epochs[self.epochs.len() - 1]
    }

    /// Close the current epoch at `now` and open the next one with the given
    /// key. Returns the new current epoch.
    pub fn rotate(
        &mut self,
        public_key: Ed25519PublicKey,
        sealed_key: SealedKey,
        now: Timestamp,
    ) -> &KeyEpoch {
        let next = self.current().epoch + 1;
        if let Some(last) = self.epochs.last_mut() {
            last.valid_until = Some(now);
        }
        self.epochs.push(KeyEpoch {
            epoch: next,
            public_key,
            sealed_key,
            valid_from: now,
            valid_until: None,
        });
        self.current()
    }

    /// Look up an epoch by number.
    pub fn epoch(&self, epoch: u32) -> Option<&KeyEpoch> {
        self.epochs.iter().find(|e| e.epoch == epoch)
    }

    /// Every epoch, oldest first.
    pub fn epochs(&self) -> &[KeyEpoch] {
        &self.epochs
    }

    /// Epochs that could have signed a credential issued at `issued_at`,
    /// newest first.
    pub fn verification_candidates(
        &self,
        issued_at: Timestamp,
    ) -> impl Iterator<Item = &KeyEpoch> + '_ {
        self.epochs.iter().rev().filter(move |e| e.covers(issued_at))
    }

    /// When the most recent rotation happened, if any.
    pub fn last_rotated_at(&self) -> Option<Timestamp> {
        if self.epochs.len() > 1 {
            Some(self.current().valid_from)
        } else {
            None
        }
    }
}
