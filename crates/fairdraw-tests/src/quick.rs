//! Quick approximate battery.
//!
//! Three tests that are always eligible and cheap enough to run on every
//! draw and every audit request. Block frequency uses `exp(-chi2/2)` instead
//! of the regularized gamma survival function, so these p-values are
//! indicative only. Use [`crate::nist`] for compliant results.

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

use crate::{SIGNIFICANCE, TestRecord, count_ones};

/// Block length used by the quick block frequency test.
pub const QUICK_BLOCK_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickSummary {
    pub passed: usize,
    pub total: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickReport {
    pub tests: Vec<TestRecord>,
    pub summary: QuickSummary,
}

fn record(name: &str, p: f64) -> TestRecord {
    TestRecord {
        name: name.to_string(),
        passed: TestRecord::pass_from_p(Some(p), SIGNIFICANCE),
        p_value: p,
        p_values: Vec::new(),
        note: None,
    }
}

/// Monobit frequency: `S = |2·ones − n| / √n`, `p = erfc(S/√2)`.
pub fn monobit_frequency(bits: &[u8]) -> TestRecord {
    let name = "monobit_frequency";
    let n = bits.len();
    if n == 0 {
        return TestRecord::failed(name, "empty sequence");
    }
    let ones = count_ones(bits) as i64;
    let s_obs = (2 * ones - n as i64).abs() as f64 / (n as f64).sqrt();
    record(name, erfc(s_obs / SQRT_2))
}

/// Runs test with the frequency pre-test.
pub fn runs(bits: &[u8]) -> TestRecord {
    let name = "runs";
    let n = bits.len();
    if n == 0 {
        return TestRecord::failed(name, "empty sequence");
    }
    let nf = n as f64;
    let pi = count_ones(bits) as f64 / nf;
    if (pi - 0.5).abs() >= 2.0 / nf.sqrt() {
        return TestRecord::failed(name, "pi too far from 0.5");
    }
    let v = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let den = 2.0 * (2.0 * nf).sqrt() * pi * (1.0 - pi);
    if den <= 0.0 {
        return TestRecord::failed(name, "zero variance");
    }
    let num = (v as f64 - 2.0 * nf * pi * (1.0 - pi)).abs();
    record(name, erfc(num / den))
}

/// Block frequency over `QUICK_BLOCK_SIZE`-bit blocks with the approximate
/// p-value `exp(-chi2/2)`.
pub fn block_frequency(bits: &[u8]) -> TestRecord {
    let name = "block_frequency";
    let m = QUICK_BLOCK_SIZE;
    if bits.is_empty() {
        return TestRecord::failed(name, "empty sequence");
    }
    if bits.len() < m {
        return TestRecord::failed(name, "n < m");
    }
    let t: f64 = bits
        .chunks_exact(m)
        .map(|block| {
            let pi = count_ones(block) as f64 / m as f64;
            (pi - 0.5) * (pi - 0.5)
        })
        .sum();
    let chi_sq = 4.0 * m as f64 * t;
    record(name, (-chi_sq / 2.0).exp())
}

/// Run all three quick tests and summarize them.
pub fn quick_battery(bits: &[u8]) -> QuickReport {
    let tests = vec![monobit_frequency(bits), runs(bits), block_frequency(bits)];
    let passed = tests.iter().filter(|r| r.passed).count();
    let total = tests.len();
    QuickReport {
        summary: QuickSummary {
            passed,
            total,
            score: passed as f64 / total as f64,
        },
        tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pseudo_random_bits;

    #[test]
    fn test_all_zero_fails_monobit() {
        let bits = vec![0u8; 1024];
        let r = monobit_frequency(&bits);
        assert!(!r.passed);
        assert!(r.p_value < 1e-10);
    }

    #[test]
    fn test_runs_precondition_reports_note() {
        let bits = vec![1u8; 1000];
        let r = runs(&bits);
        assert!(!r.passed);
        assert_eq!(r.p_value, 0.0);
        assert_eq!(r.note.as_deref(), Some("pi too far from 0.5"));
    }

    #[test]
    fn test_alternating_bits_fail_runs() {
        let bits: Vec<u8> = (0..1000).map(|i| (i % 2) as u8).collect();
        let r = runs(&bits);
        assert!(!r.passed, "alternating sequence has far too many runs");
    }

    #[test]
    fn test_block_frequency_short_input() {
        let r = block_frequency(&[1, 0, 1]);
        assert!(!r.passed);
        assert_eq!(r.note.as_deref(), Some("n < m"));
    }

    #[test]
    fn test_block_frequency_balanced_blocks() {
        // Every block holds exactly 16 ones: chi2 = 0, p = 1.
        let bits: Vec<u8> = (0..1024).map(|i| (i % 2) as u8).collect();
        let r = block_frequency(&bits);
        assert!((r.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sequence_fails_everything() {
        let report = quick_battery(&[]);
        assert_eq!(report.summary.passed, 0);
        assert_eq!(report.summary.total, 3);
        assert!(report
            .tests
            .iter()
            .all(|t| t.note.as_deref() == Some("empty sequence")));
    }

    #[test]
    fn test_pseudo_random_passes_monobit_and_runs() {
        let bits = pseudo_random_bits(20_000);
        let report = quick_battery(&bits);
        assert!(report.tests[0].p_value > 1e-4, "{:?}", report.tests[0]);
        assert!(report.tests[1].p_value > 1e-4, "{:?}", report.tests[1]);
        assert_eq!(report.summary.total, 3);
    }
}
