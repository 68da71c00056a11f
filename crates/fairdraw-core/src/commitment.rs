//! Seed and fingerprint derivation.
//!
//! `seed = SHA256(ascii(bits))` and
//! `fingerprint = hex(SHA256(seed ‖ "|commit_v1"))`. Anyone holding the
//! published bits can recompute both.

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::bits::BitStream;
use crate::stage::StageLogger;

/// Domain separation tag appended to the seed before hashing.
pub const COMMIT_DOMAIN_TAG: &[u8] = b"|commit_v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub seed: [u8; 32],
    pub fingerprint: String,
}

pub fn derive(bits: &BitStream) -> Commitment {
    let seed: [u8; 32] = Sha256::digest(bits.to_string().as_bytes()).into();
    let mut h = Sha256::new();
    h.update(seed);
    h.update(COMMIT_DOMAIN_TAG);
    let fingerprint = hex::encode(&h.finalize());
    Commitment { seed, fingerprint }
}

/// Logged wrapper around [`derive`].
pub fn derive_logged(bits: &BitStream, logger: &StageLogger<'_>) -> Commitment {
    logger.stage("seed:start", json!({"bits": bits.len()}));
    let c = derive(bits);
    logger.stage(
        "seed:done",
        json!({"seed_bytes": c.seed.len(), "fingerprint": c.fingerprint}),
    );
    c
}

/// Recompute the fingerprint of `bits` and compare, ignoring hex case.
pub fn verify(bits: &BitStream, fingerprint: &str) -> bool {
    derive(bits).fingerprint.eq_ignore_ascii_case(fingerprint.trim())
}

pub mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}
