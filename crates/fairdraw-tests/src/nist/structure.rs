//! Structural tests: binary matrix rank, discrete Fourier transform, and
//! linear complexity.

use rustfft::{FftPlanner, num_complex::Complex};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

use crate::{TestError, igamc};

const MATRIX_DIM: usize = 32;
const MATRIX_BITS: usize = MATRIX_DIM * MATRIX_DIM;

/// 38 full 32×32 matrices.
pub(super) const RANK_MIN_BITS: usize = 38 * MATRIX_BITS;

const LINEAR_COMPLEXITY_BLOCK: usize = 500;
pub(super) const LINEAR_COMPLEXITY_MIN_BITS: usize = 1_000_000;

/// Rank over GF(2) of a square matrix whose rows are bitmasks.
fn gf2_rank(mut rows: [u32; MATRIX_DIM]) -> usize {
    let mut rank = 0;
    for col in (0..MATRIX_DIM).rev() {
        let mask = 1u32 << col;
        let Some(pivot) = (rank..MATRIX_DIM).find(|&r| rows[r] & mask != 0) else {
            continue;
        };
        rows.swap(rank, pivot);
        let pivot_row = rows[rank];
        for (r, row) in rows.iter_mut().enumerate() {
            if r != rank && *row & mask != 0 {
                *row ^= pivot_row;
            }
        }
        rank += 1;
    }
    rank
}

fn pack_matrix(bits: &[u8]) -> [u32; MATRIX_DIM] {
    let mut rows = [0u32; MATRIX_DIM];
    for (row, chunk) in rows.iter_mut().zip(bits.chunks_exact(MATRIX_DIM)) {
        *row = chunk.iter().fold(0u32, |acc, &b| (acc << 1) | u32::from(b & 1));
    }
    rows
}

pub(super) fn binary_matrix_rank(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let matrices = bits.len() / MATRIX_BITS;
    if matrices == 0 {
        return Err(TestError::Precondition("fewer than 1024 bits".into()));
    }
    let (mut full, mut minus_one) = (0usize, 0usize);
    for chunk in bits.chunks_exact(MATRIX_BITS) {
        match gf2_rank(pack_matrix(chunk)) {
            r if r == MATRIX_DIM => full += 1,
            r if r == MATRIX_DIM - 1 => minus_one += 1,
            _ => {}
        }
    }
    let rest = matrices - full - minus_one;
    let nf = matrices as f64;
    let chi_sq = [(full, 0.2888), (minus_one, 0.5776), (rest, 0.1336)]
        .iter()
        .map(|&(obs, p)| (obs as f64 - nf * p).powi(2) / (nf * p))
        .sum::<f64>();
    Ok(vec![(-chi_sq / 2.0).exp()])
}

pub(super) fn dft(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    let n = bits.len();
    if n == 0 {
        return Err(TestError::Precondition("empty sequence".into()));
    }
    let mut buffer: Vec<Complex<f64>> = bits
        .iter()
        .map(|&b| Complex {
            re: if b == 1 { 1.0 } else { -1.0 },
            im: 0.0,
        })
        .collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let nf = n as f64;
    let threshold = (20f64.ln() * nf).sqrt();
    let n0 = 0.95 * nf / 2.0;
    let n1 = buffer[..n / 2]
        .iter()
        .filter(|c| c.norm() < threshold)
        .count() as f64;
    let d = (n1 - n0) / (nf * 0.95 * 0.05 / 4.0).sqrt();
    Ok(vec![erfc(d.abs() / SQRT_2)])
}

/// Length of the shortest LFSR generating `seq` (Berlekamp-Massey over GF(2)).
fn berlekamp_massey(seq: &[u8]) -> usize {
    let n = seq.len();
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut l = 0usize;
    let mut m: isize = -1;

    for i in 0..n {
        let mut d = seq[i];
        for j in 1..=l {
            d ^= c[j] & seq[i - j];
        }
        if d == 0 {
            continue;
        }
        let shift = (i as isize - m) as usize;
        if 2 * l <= i {
            let t = c.clone();
            for j in shift..=n {
                c[j] ^= b[j - shift];
            }
            l = i + 1 - l;
            m = i as isize;
            b = t;
        } else {
            for j in shift..=n {
                c[j] ^= b[j - shift];
            }
        }
    }
    l
}

pub(super) fn linear_complexity(bits: &[u8]) -> Result<Vec<f64>, TestError> {
    const PI: [f64; 7] = [0.010417, 0.03125, 0.125, 0.5, 0.25, 0.0625, 0.020833];
    let m = LINEAR_COMPLEXITY_BLOCK;
    let blocks = bits.len() / m;
    if blocks == 0 {
        return Err(TestError::Precondition(format!("n < M = {m}")));
    }
    let mf = m as f64;
    // M = 500 is even: (-1)^(M+1) = -1 and (-1)^M = 1.
    let mu = mf / 2.0 + (9.0 - 1.0) / 36.0 - (mf / 3.0 + 2.0 / 9.0) / 2f64.powf(mf);

    let mut v = [0usize; 7];
    for block in bits.chunks_exact(m) {
        let t = berlekamp_massey(block) as f64 - mu + 2.0 / 9.0;
        let idx = match t {
            t if t <= -2.5 => 0,
            t if t <= -1.5 => 1,
            t if t <= -0.5 => 2,
            t if t <= 0.5 => 3,
            t if t <= 1.5 => 4,
            t if t <= 2.5 => 5,
            _ => 6,
        };
        v[idx] += 1;
    }
    let nf = blocks as f64;
    let chi_sq: f64 = v
        .iter()
        .zip(PI)
        .map(|(&obs, p)| (obs as f64 - nf * p).powi(2) / (nf * p))
        .sum();
    Ok(vec![igamc(3.0, chi_sq / 2.0)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pseudo_random_bits;

    fn bits_from(s: &str) -> Vec<u8> {
        s.bytes().map(|c| c - b'0').collect()
    }

    #[test]
    fn test_gf2_rank_identity_and_zero() {
        let mut identity = [0u32; MATRIX_DIM];
        for (i, row) in identity.iter_mut().enumerate() {
            *row = 1 << i;
        }
        assert_eq!(gf2_rank(identity), 32);
        assert_eq!(gf2_rank([0u32; MATRIX_DIM]), 0);
    }

    #[test]
    fn test_gf2_rank_dependent_row() {
        let mut rows = [0u32; MATRIX_DIM];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = 1 << i;
        }
        rows[31] = rows[0] ^ rows[1];
        assert_eq!(gf2_rank(rows), 31);
    }

    #[test]
    fn test_pack_matrix_msb_first() {
        let mut bits = vec![0u8; MATRIX_BITS];
        bits[0] = 1;
        bits[MATRIX_DIM + 31] = 1;
        let rows = pack_matrix(&bits);
        assert_eq!(rows[0], 1 << 31);
        assert_eq!(rows[1], 1);
    }

    #[test]
    fn test_berlekamp_massey_reference() {
        // SP 800-22 section 2.10.8 example sequence has L = 4.
        assert_eq!(berlekamp_massey(&bits_from("1101011110001")), 4);
        assert_eq!(berlekamp_massey(&[0, 0, 0, 0]), 0);
        assert_eq!(berlekamp_massey(&[0, 0, 0, 1]), 4);
    }

    #[test]
    fn test_dft_short_sequence() {
        // Five of the five retained magnitudes fall below the 95% threshold.
        let p = dft(&bits_from("1001010011")).unwrap()[0];
        assert!((p - 0.468160).abs() < 1e-5, "p = {p}");
    }

    #[test]
    fn test_dft_detects_periodic_signal() {
        let bits: Vec<u8> = (0..4096).map(|i| ((i / 4) % 2) as u8).collect();
        let p = dft(&bits).unwrap()[0];
        assert!(p < 0.01, "p = {p}");
    }

    #[test]
    fn test_structure_tests_on_pseudo_random() {
        let bits = pseudo_random_bits(RANK_MIN_BITS * 2);
        let p = binary_matrix_rank(&bits).unwrap()[0];
        assert!(p > 1e-4, "rank p = {p}");
        let p = dft(&pseudo_random_bits(65_536)).unwrap()[0];
        assert!(p > 1e-4, "dft p = {p}");
    }

    #[test]
    fn test_rank_rejects_zero_matrices() {
        let p = binary_matrix_rank(&vec![0u8; RANK_MIN_BITS]).unwrap()[0];
        assert!(p < 1e-10);
    }
}
