//! Whitening.
//!
//! The von Neumann extractor reads non-overlapping bit pairs: `01` emits `1`,
//! `10` emits `0`, `00` and `11` emit nothing. It removes first-order bias
//! from independent bits but its yield depends on the input, so
//! [`whiten_to_target`] keeps pulling larger raw batches until enough
//! whitened bits have accumulated.

use serde_json::json;

use crate::bits::BitStream;
use crate::error::{CoreError, Result};
use crate::stage::StageLogger;

/// Smallest raw batch requested in the first round.
pub const MIN_INITIAL_BATCH: usize = 4096;
/// Floor of the batch-size ceiling.
pub const MIN_BATCH_CAP: usize = 65_536;
/// Rounds without reaching the target before giving up.
pub const MAX_WHITENING_ROUNDS: usize = 64;

pub fn von_neumann_extract(bits: &BitStream) -> BitStream {
    let mut out = BitStream::with_capacity(bits.len() / 4);
    let mut iter = bits.iter();
    while let (Some(a), Some(b)) = (iter.next(), iter.next()) {
        if a != b {
            out.push(b);
        }
    }
    out
}

/// Logged wrapper around [`von_neumann_extract`].
pub fn whiten(bits: &BitStream, logger: &StageLogger<'_>) -> BitStream {
    logger.stage("whitening:von_neumann:start", json!({"in_bits": bits.len()}));
    let out = von_neumann_extract(bits);
    logger.stage("whitening:von_neumann:done", json!({"out_bits": out.len()}));
    out
}

/// Raw batch size for the first round.
pub fn initial_batch(target: usize) -> usize {
    MIN_INITIAL_BATCH.max(target.saturating_mul(2))
}

/// Raw batch size after a shortfall: doubled, up to the cap.
pub fn next_batch(batch: usize, target: usize) -> usize {
    let cap = MIN_BATCH_CAP.max(target.saturating_mul(16));
    batch.saturating_mul(2).min(cap)
}

/// Collect-and-whiten until exactly `target` whitened bits are available.
///
/// `collect(n)` must return a raw batch of `n` bits. Fails with
/// [`CoreError::WhiteningStalled`] if [`MAX_WHITENING_ROUNDS`] rounds do not
/// reach the target (e.g. a constant raw stream).
pub fn whiten_to_target<F>(target: usize, logger: &StageLogger<'_>, mut collect: F) -> Result<BitStream>
where
    F: FnMut(usize) -> BitStream,
{
    let mut white = BitStream::with_capacity(target);
    let mut batch = initial_batch(target);
    let mut rounds = 0;
    while white.len() < target {
        if rounds == MAX_WHITENING_ROUNDS {
            return Err(CoreError::WhiteningStalled {
                rounds,
                have: white.len(),
                need: target,
            });
        }
        rounds += 1;
        let raw = collect(batch);
        white.append(&whiten(&raw, logger));
        if white.len() < target {
            let next = next_batch(batch, target);
            logger.stage(
                "whitening:shortfall",
                json!({"have": white.len(), "need": target, "next_batch": next}),
            );
            batch = next;
        }
    }
    white.truncate(target);
    Ok(white)
}
