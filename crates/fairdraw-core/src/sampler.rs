//! Draw sampler.
//!
//! The generator and the selection algorithm are pinned: a published
//! fingerprint is only useful if the combo can be recomputed from the seed
//! forever. Any change here needs a new [`SAMPLER_ALGORITHM`] id.
//!
//! - generator: `ChaCha20Rng::from_seed(seed)`, the 32 seed bytes as-is
//! - uniform `[1, j]`: rejection on `next_u64` below `⌊2^64 / j⌋ · j`
//! - selection: Floyd's combination algorithm, then ascending order

use std::collections::BTreeSet;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde_json::json;

use crate::error::{CoreError, Result};
use crate::stage::StageLogger;

/// Identifier published alongside every draw.
pub const SAMPLER_ALGORITHM: &str = "chacha20-floyd-v1";

/// Uniform integer in `[1, j]` without modulo bias.
fn uniform_in(rng: &mut ChaCha20Rng, j: u64) -> u64 {
    let span = u128::from(j);
    let zone = (1u128 << 64) / span * span;
    loop {
        let v = u128::from(rng.next_u64());
        if v < zone {
            return 1 + (v % span) as u64;
        }
    }
}

/// `k` distinct integers from `[1, max]`, ascending, fully determined by `seed`.
pub fn sample(seed: &[u8; 32], k: usize, max: u64) -> Result<Vec<u64>> {
    if k == 0 || max == 0 || k as u64 > max {
        return Err(CoreError::InvalidSample { k, max });
    }
    let mut rng = ChaCha20Rng::from_seed(*seed);
    let mut chosen = BTreeSet::new();
    for j in (max - k as u64 + 1)..=max {
        let t = uniform_in(&mut rng, j);
        if !chosen.insert(t) {
            chosen.insert(j);
        }
    }
    Ok(chosen.into_iter().collect())
}

/// Logged wrapper around [`sample`].
pub fn sample_logged(seed: &[u8; 32], k: usize, max: u64, logger: &StageLogger<'_>) -> Result<Vec<u64>> {
    logger.stage("draw:start", json!({"numbers": k, "max": max}));
    let combo = sample(seed, k, max)?;
    logger.stage("draw:done", json!({"combo": combo}));
    Ok(combo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_bad_parameters() {
        let seed = [7u8; 32];
        assert!(matches!(sample(&seed, 0, 49), Err(CoreError::InvalidSample { .. })));
        assert!(matches!(sample(&seed, 1, 0), Err(CoreError::InvalidSample { .. })));
        assert!(matches!(sample(&seed, 50, 49), Err(CoreError::InvalidSample { .. })));
    }

    #[test]
    fn test_full_range_is_permutation_set() {
        let combo = sample(&[1u8; 32], 10, 10).unwrap();
        assert_eq!(combo, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_reproducible() {
        let seed = [42u8; 32];
        assert_eq!(sample(&seed, 6, 49).unwrap(), sample(&seed, 6, 49).unwrap());
    }

    #[test]
    fn test_seed_changes_draw() {
        let a = sample(&[1u8; 32], 6, 1_000_000).unwrap();
        let b = sample(&[2u8; 32], 6, 1_000_000).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_uniform_in_bounds() {
        let mut rng = ChaCha20Rng::from_seed([9u8; 32]);
        for j in [1u64, 2, 3, 49, u64::MAX] {
            for _ in 0..100 {
                let v = uniform_in(&mut rng, j);
                assert!((1..=j).contains(&v));
            }
        }
    }

    #[test]
    fn test_single_value_range_hits_every_number() {
        // Over many seeds, every number in a small range should appear.
        let mut seen = [false; 5];
        for s in 0..200u8 {
            let combo = sample(&[s; 32], 1, 5).unwrap();
            seen[(combo[0] - 1) as usize] = true;
        }
        assert!(seen.iter().all(|&x| x));
    }

    proptest! {
        #[test]
        fn prop_distinct_sorted_in_range(
            seed in any::<[u8; 32]>(),
            max in 1u64..500,
            k_frac in 0.0f64..1.0,
        ) {
            let k = ((max as f64 * k_frac) as usize).max(1);
            let combo = sample(&seed, k, max).unwrap();
            prop_assert_eq!(combo.len(), k);
            prop_assert!(combo.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(combo.iter().all(|&v| (1..=max).contains(&v)));
            prop_assert_eq!(combo, sample(&seed, k, max).unwrap());
        }
    }
}
