//! Random-walk tests over the partial sums of the ±1 sequence: cumulative
//! sums and the two random excursion tests.

use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

use crate::{TestError, igamc, signed};

pub(super) const EXCURSION_MIN_BITS: usize = 1_000_000;
pub(super) const EXCURSION_MIN_CYCLES: usize = 500;

const EXCURSION_STATES: [i64; 8] = [-4, -3, -2, -1, 1, 2, 3, 4];

/// Probability that a cycle visits state ±x exactly k times (k = 0..4, ≥5),
/// indexed by |x| − 1.
const EXCURSION_PI: [[f64; 6]; 4] = [
    [0.5, 0.25, 0.125, 0.0625, 0.0312, 0.0313],
    [0.75, 0.0625, 0.0469, 0.0352, 0.0264, 0.0791],
    [0.8333, 0.0278, 0.0231, 0.0193, 0.0161, 0.0804],
    [0.875, 0.0156, 0.0137, 0.0120, 0.0105, 0.0733],
];

fn partial_sums(bits: &[u8]) -> Vec<i64> {
    bits.iter()
        .scan(0i64, |s, &b| {
            *s += signed(b);
            Some(*s)
        })
        .collect()
}

/// Standard normal CDF.
fn phi(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

fn cusum_p_value(n: usize, z: i64) -> f64 {
    let nf = n as f64;
    let zf = z as f64;
    let sqrt_n = nf.sqrt();
    let upper = ((nf / zf - 1.0) / 4.0) as i64;

    let lower1 = ((-nf / zf + 1.0) / 4.0) as i64;
    let sum1: f64 = (lower1..=upper)
        .map(|k| {
            let k = k as f64;
            phi((4.0 * k + 1.0) * zf / sqrt_n) - phi((4.0 * k - 1.0) * zf / sqrt_n)
        })
        .sum();

    let lower2 = ((-nf / zf - 3.0) / 4.0) as i64;
    let sum2: f64 = (lower2..=upper)
        .map(|k| {
            let k = k as f64;
            phi((4.0 * k + 3.0) * zf / sqrt_n) - phi((4.0 * k + 1.0) * zf / sqrt_n)
        })
        .sum();

    1.0 - sum1 + sum2
}

fn max_excursion<'a>(bits: impl Iterator<Item = &'a u8>) -> i64 {
    let mut s = 0i64;
    let mut z = 0i64;
    for &b in bits {
        s += signed(b);
        z = z.max(s.abs());
    }
    z
}

/// Forward and backward cumulative sums.
pub(super) fn cumulative_sums(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let n = bits.len();
    let forward = max_excursion(bits.iter());
    let backward = max_excursion(bits.iter().rev());
    if forward == 0 || backward == 0 {
        return Err(TestError::Precondition("empty sequence".into()));
    }
    Ok(vec![cusum_p_value(n, forward), cusum_p_value(n, backward)])
}

/// Number of cycles in the walk padded as `[0, S, 0]`: the segments between
/// consecutive zeros, so one more than the interior returns to zero.
pub(super) fn cycle_count(bits: &[u8]) -> usize {
    if bits.is_empty() {
        return 0;
    }
    partial_sums(bits).iter().filter(|&&s| s == 0).count() + 1
}

/// Visit counts to each state, split per cycle.
fn cycle_visits(bits: &[u8]) -> Vec<[usize; 8]> {
    let sums = partial_sums(bits);
    let mut cycles = Vec::new();
    let mut current = [0usize; 8];
    for &s in &sums {
        if s == 0 {
            cycles.push(current);
            current = [0; 8];
        } else if let Some(idx) = EXCURSION_STATES.iter().position(|&x| x == s) {
            current[idx] += 1;
        }
    }
    if !sums.is_empty() {
        cycles.push(current);
    }
    cycles
}

pub(super) fn random_excursion(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let cycles = cycle_visits(bits);
    if cycles.is_empty() {
        return Err(TestError::Precondition("no cycles".into()));
    }
    let j = cycles.len() as f64;
    let p_values = EXCURSION_STATES
        .iter()
        .enumerate()
        .map(|(idx, &x)| {
            let pi = &EXCURSION_PI[(x.unsigned_abs() - 1) as usize];
            let mut v = [0usize; 6];
            for cycle in &cycles {
                v[cycle[idx].min(5)] += 1;
            }
            let chi_sq: f64 = v
                .iter()
                .zip(pi)
                .map(|(&obs, &p)| (obs as f64 - j * p).powi(2) / (j * p))
                .sum();
            igamc(2.5, chi_sq / 2.0)
        })
        .collect();
    Ok(p_values)
}

pub(super) fn random_excursion_variant(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let j = cycle_count(bits);
    if j == 0 {
        return Err(TestError::Precondition("no cycles".into()));
    }
    let mut visits = [0usize; 19];
    for s in partial_sums(bits) {
        if (-9..=9).contains(&s) {
            visits[(s + 9) as usize] += 1;
        }
    }
    let jf = j as f64;
    let p_values = (-9i64..=9)
        .filter(|&x| x != 0)
        .map(|x| {
            let xi = visits[(x + 9) as usize] as f64;
            let den = (2.0 * jf * (4.0 * x.abs() as f64 - 2.0)).sqrt();
            erfc((xi - jf).abs() / den / SQRT_2)
        })
        .collect();
    Ok(p_values)
}
