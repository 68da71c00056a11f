//! Pattern-counting tests: template matching, Maurer's universal statistic,
//! serial, and approximate entropy.

use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

use crate::{TestError, igamc};

pub(super) const NON_OVERLAPPING_MIN_BITS: usize = 65_536;
pub(super) const OVERLAPPING_MIN_BITS: usize = 1_000_000;
pub(super) const SERIAL_PATTERN_LENGTH: usize = 4;
pub(super) const APEN_PATTERN_LENGTH: usize = 3;

const APERIODIC_TEMPLATE: [u8; 9] = [0, 0, 0, 0, 0, 0, 0, 0, 1];
const NON_OVERLAPPING_BLOCKS: usize = 8;

const OVERLAPPING_TEMPLATE_LEN: usize = 9;
const OVERLAPPING_BLOCK: usize = 1032;
const OVERLAPPING_PI: [f64; 6] = [0.364091, 0.185659, 0.139381, 0.100571, 0.0704323, 0.139865];

fn non_overlapping_with(bits: &[u8], template: &[u8], blocks: usize) -> Result<Vec<f64>, TestError> {
    let m = template.len();
    let block_len = bits.len() / blocks;
    if block_len < m {
        return Err(TestError::Precondition("block shorter than template".into()));
    }
    let mf = m as f64;
    let big_m = block_len as f64;
    let mu = (big_m - mf + 1.0) / 2f64.powf(mf);
    let var = big_m * (1.0 / 2f64.powf(mf) - (2.0 * mf - 1.0) / 2f64.powf(2.0 * mf));

    let mut chi_sq = 0.0;
    for block in bits.chunks_exact(block_len).take(blocks) {
        let mut hits = 0usize;
        let mut j = 0;
        while j + m <= block_len {
            if block[j..j + m] == *template {
                hits += 1;
                j += m;
            } else {
                j += 1;
            }
        }
        chi_sq += (hits as f64 - mu).powi(2) / var;
    }
    Ok(vec![igamc(blocks as f64 / 2.0, chi_sq / 2.0)])
}

pub(super) fn non_overlapping_template(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    non_overlapping_with(bits, &APERIODIC_TEMPLATE, NON_OVERLAPPING_BLOCKS)
}

pub(super) fn overlapping_template(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let m = OVERLAPPING_TEMPLATE_LEN;
    let blocks = bits.len() / OVERLAPPING_BLOCK;
    if blocks == 0 {
        return Err(TestError::Precondition(format!("n < M = {OVERLAPPING_BLOCK}")));
    }
    let mut v = [0usize; 6];
    for block in bits.chunks_exact(OVERLAPPING_BLOCK) {
        let hits = block
            .windows(m)
            .filter(|w| w.iter().all(|&b| b == 1))
            .count();
        v[hits.min(5)] += 1;
    }
    let nf = blocks as f64;
    let chi_sq: f64 = v
        .iter()
        .zip(OVERLAPPING_PI)
        .map(|(&obs, p)| (obs as f64 - nf * p).powi(2) / (nf * p))
        .sum();
    Ok(vec![igamc(2.5, chi_sq / 2.0)])
}

/// (minimum n, L, expected value, variance)
const MAURER_TABLE: [(usize, usize, f64, f64); 5] = [
    (387_840, 6, 5.2177052, 2.954),
    (904_960, 7, 6.1962507, 3.125),
    (2_068_480, 8, 7.1836656, 3.238),
    (4_654_080, 9, 8.1764248, 3.311),
    (10_342_400, 10, 9.1723243, 3.356),
];

/// Block length L for Maurer's test, or `None` when `n` is too short.
pub(super) fn maurer_block_length(n: usize) -> Option<usize> {
    MAURER_TABLE
        .iter()
        .rev()
        .find(|(min_n, ..)| n >= *min_n)
        .map(|&(_, l, ..)| l)
}

pub(super) fn maurers_universal(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let n = bits.len();
    let Some(&(_, l, expected, variance)) = MAURER_TABLE.iter().rev().find(|(min_n, ..)| n >= *min_n)
    else {
        return Err(TestError::Precondition(format!("n = {n} below 387840")));
    };
    let q = 10 * (1usize << l);
    let total_blocks = n / l;
    let k = total_blocks - q;

    let block_value = |i: usize| {
        bits[i * l..(i + 1) * l]
            .iter()
            .fold(0usize, |acc, &b| (acc << 1) | usize::from(b & 1))
    };

    // Last position (1-based) at which each L-bit value occurred.
    let mut table = vec![0usize; 1 << l];
    for i in 0..q {
        table[block_value(i)] = i + 1;
    }
    let mut sum = 0.0;
    for i in q..total_blocks {
        let v = block_value(i);
        sum += ((i + 1 - table[v]) as f64).log2();
        table[v] = i + 1;
    }

    let kf = k as f64;
    let lf = l as f64;
    let f_n = sum / kf;
    let c = 0.7 - 0.8 / lf + (4.0 + 32.0 / lf) * kf.powf(-3.0 / lf) / 15.0;
    let sigma = c * (variance / kf).sqrt();
    Ok(vec![erfc((f_n - expected).abs() / (SQRT_2 * sigma))])
}

/// Frequency of every k-bit pattern, wrapping the sequence around its end.
fn cyclic_pattern_counts(bits: &[u8], k: usize) -> Vec<usize> {
    let n = bits.len();
    if k == 0 {
        return vec![n];
    }
    let mask = (1usize << k) - 1;
    let mut counts = vec![0usize; 1 << k];
    let mut value = bits[..k.min(n)]
        .iter()
        .fold(0usize, |acc, &b| (acc << 1) | usize::from(b & 1));
    for i in 0..n {
        counts[value] += 1;
        value = ((value << 1) | usize::from(bits[(i + k) % n] & 1)) & mask;
    }
    counts
}

fn psi_sq(bits: &[u8], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let n = bits.len() as f64;
    let sum: f64 = cyclic_pattern_counts(bits, k)
        .iter()
        .map(|&c| (c as f64).powi(2))
        .sum();
    2f64.powi(k as i32) / n * sum - n
}

fn serial_with(bits: &[u8], m: usize) -> Result<Vec<f64>, TestError> {
    if m < 3 || bits.len() < m {
        return Err(TestError::Precondition(format!("pattern length {m} unusable")));
    }
    let psi_m = psi_sq(bits, m);
    let psi_m1 = psi_sq(bits, m - 1);
    let psi_m2 = psi_sq(bits, m - 2);
    let del1 = psi_m - psi_m1;
    let del2 = psi_m - 2.0 * psi_m1 + psi_m2;
    Ok(vec![
        igamc(2f64.powi(m as i32 - 2), del1 / 2.0),
        igamc(2f64.powi(m as i32 - 3), del2 / 2.0),
    ])
}

pub(super) fn serial(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    serial_with(bits, SERIAL_PATTERN_LENGTH)
}

fn phi(bits: &[u8], k: usize) -> f64 {
    let n = bits.len() as f64;
    cyclic_pattern_counts(bits, k)
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p.ln()
        })
        .sum()
}

fn approximate_entropy_with(bits: &[u8], m: usize) -> Result<Vec<f64>, TestError> {
    if bits.len() <= m {
        return Err(TestError::Precondition(format!("n <= m = {m}")));
    }
    let n = bits.len() as f64;
    let ap_en = phi(bits, m) - phi(bits, m + 1);
    let chi_sq = 2.0 * n * (std::f64::consts::LN_2 - ap_en);
    Ok(vec![igamc(2f64.powi(m as i32 - 1), chi_sq / 2.0)])
}

pub(super) fn approximate_entropy(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    approximate_entropy_with(bits, APEN_PATTERN_LENGTH)
}
