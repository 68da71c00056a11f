//! Frequency-family tests: monobit, frequency within a block, runs, and
//! longest run of ones.

use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

use crate::{TestError, count_ones, igamc, signed};

pub(super) fn monobit(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let n = bits.len();
    let s: i64 = bits.iter().map(|&b| signed(b)).sum();
    let s_obs = s.abs() as f64 / (n as f64).sqrt();
    Ok(vec![erfc(s_obs / SQRT_2)])
}

/// Block length for the frequency-within-block test: at least 20 bits, and
/// large enough that the sequence splits into fewer than 100 blocks.
pub(super) fn block_length(n: usize) -> usize {
    20usize.max(n / 99 + 1)
}

pub(super) fn frequency_within_block(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let m = block_length(bits.len());
    let blocks = bits.len() / m;
    if blocks == 0 {
        return Err(TestError::Precondition(format!("n < M = {m}")));
    }
    let sum: f64 = bits
        .chunks_exact(m)
        .map(|block| {
            let pi = count_ones(block) as f64 / m as f64;
            (pi - 0.5).powi(2)
        })
        .sum();
    let chi_sq = 4.0 * m as f64 * sum;
    Ok(vec![igamc(blocks as f64 / 2.0, chi_sq / 2.0)])
}

pub(super) fn runs(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let n = bits.len() as f64;
    let pi = count_ones(bits) as f64 / n;
    // Frequency pre-test: the runs statistic is meaningless on a biased sequence.
    if (pi - 0.5).abs() >= 2.0 / n.sqrt() {
        return Ok(vec![0.0]);
    }
    let v_obs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let num = (v_obs as f64 - 2.0 * n * pi * (1.0 - pi)).abs();
    let den = 2.0 * (2.0 * n).sqrt() * pi * (1.0 - pi);
    if den <= 0.0 {
        return Err(TestError::Numerical("zero variance".into()));
    }
    Ok(vec![erfc(num / den)])
}

/// Block length, lowest bin and class probabilities for the longest-run test.
struct LongestRunTable {
    m: usize,
    v_min: usize,
    pi: &'static [f64],
}

const LONGEST_RUN_8: LongestRunTable = LongestRunTable {
    m: 8,
    v_min: 1,
    pi: &[0.2148, 0.3672, 0.2305, 0.1875],
};

const LONGEST_RUN_128: LongestRunTable = LongestRunTable {
    m: 128,
    v_min: 4,
    pi: &[0.1174, 0.2430, 0.2493, 0.1752, 0.1027, 0.1124],
};

const LONGEST_RUN_10000: LongestRunTable = LongestRunTable {
    m: 10_000,
    v_min: 10,
    pi: &[0.0882, 0.2092, 0.2483, 0.1933, 0.1208, 0.0675, 0.0727],
};

fn longest_run_table(n: usize) -> &'static LongestRunTable {
    if n >= 750_000 {
        &LONGEST_RUN_10000
    } else if n >= 6272 {
        &LONGEST_RUN_128
    } else {
        &LONGEST_RUN_8
    }
}

fn longest_run(block: &[u8]) -> usize {
    let mut best = 0;
    let mut current = 0;
    for &b in block {
        if b == 1 {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

pub(super) fn longest_run_ones(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let table = longest_run_table(bits.len());
    let blocks = bits.len() / table.m;
    if blocks == 0 {
        return Err(TestError::Precondition(format!("n < M = {}", table.m)));
    }
    let k = table.pi.len() - 1;
    let mut v = vec![0usize; table.pi.len()];
    for block in bits.chunks_exact(table.m) {
        let run = longest_run(block);
        let idx = run.saturating_sub(table.v_min).min(k);
        v[idx] += 1;
    }
    let nf = blocks as f64;
    let chi_sq: f64 = v
        .iter()
        .zip(table.pi)
        .map(|(&obs, &p)| {
            let expected = nf * p;
            (obs as f64 - expected).powi(2) / expected
        })
        .sum();
    Ok(vec![igamc(k as f64 / 2.0, chi_sq / 2.0)])
}
