//! NIST SP 800-22 randomness test battery.
//!
//! Two batteries live in this crate:
//!
//! - [`quick`]: three cheap tests (monobit, runs, block frequency) that run on
//!   any non-empty sequence. The block frequency p-value is an approximation,
//!   so this battery is a smoke check and must never be reported as NIST output.
//! - [`nist`]: the fifteen SP 800-22 rev1a tests. Each test declares an
//!   eligibility predicate; only eligible tests run, and the results are
//!   folded into a [`BatterySummary`].
//!
//! Every test consumes a slice of bits where each element is `0` or `1`.

use serde::{Deserialize, Serialize};
use statrs::function::gamma::gamma_ur;
use thiserror::Error;

pub mod nist;
pub mod quick;

pub use nist::{
    BatteryEvent, BatteryRun, NistTest, RandomnessTest, SP800_22_BATTERY, check_eligibility,
    run_battery,
};
pub use quick::{QuickReport, QuickSummary, quick_battery};

/// Significance level used by every pass/fail decision in this crate.
pub const SIGNIFICANCE: f64 = 0.01;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single randomness test. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub passed: bool,
    /// The deciding p-value: the smallest one the test produced.
    pub p_value: f64,
    /// Every p-value the test produced, for tests with sub-statistics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub p_values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TestRecord {
    /// Build a record from one or more p-values. Passes iff every value is at
    /// least [`SIGNIFICANCE`].
    pub fn from_p_values(name: &str, p_values: Vec<f64>) -> Self {
        let p_value = p_values.iter().copied().fold(f64::INFINITY, f64::min);
        let p_value = if p_value.is_finite() { p_value } else { 0.0 };
        let passed =
            !p_values.is_empty() && p_values.iter().all(|&p| Self::pass_from_p(Some(p), SIGNIFICANCE));
        Self {
            name: name.to_string(),
            passed,
            p_value,
            p_values: if p_values.len() > 1 { p_values } else { Vec::new() },
            note: None,
        }
    }

    /// A failed record with p = 0 and an explanatory note.
    pub fn failed(name: &str, note: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            p_value: 0.0,
            p_values: Vec::new(),
            note: Some(note.to_string()),
        }
    }

    /// Determine pass/fail from p-value against a threshold (default 0.01).
    pub fn pass_from_p(p: Option<f64>, threshold: f64) -> bool {
        match p {
            Some(p) => p >= threshold,
            None => false,
        }
    }
}

/// Aggregate of one NIST battery run. Always recomputed from the records.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatterySummary {
    pub eligible: usize,
    pub total: usize,
    pub passed: usize,
    pub ratio: f64,
}

impl BatterySummary {
    pub fn from_records(records: &[TestRecord], eligible: usize, total: usize) -> Self {
        let passed = records.iter().filter(|r| r.passed).count();
        let ratio = if eligible > 0 {
            passed as f64 / eligible as f64
        } else {
            0.0
        };
        Self {
            eligible,
            total,
            passed,
            ratio,
        }
    }
}

/// Why a single test could not produce p-values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TestError {
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("numerical failure: {0}")]
    Numerical(String),
    #[error("test panicked")]
    Panicked,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Regularized upper incomplete gamma function Q(a, x), NIST's `igamc`.
pub(crate) fn igamc(a: f64, x: f64) -> f64 {
    if x.is_nan() || a.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    gamma_ur(a, x)
}

pub(crate) fn count_ones(bits: &[u8]) -> usize {
    bits.iter().filter(|&&b| b == 1).count()
}

/// Map 0 → −1 and 1 → +1.
pub(crate) fn signed(bit: u8) -> i64 {
    if bit == 1 { 1 } else { -1 }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_from_p() {
        assert!(TestRecord::pass_from_p(Some(0.05), 0.01));
        assert!(TestRecord::pass_from_p(Some(0.01), 0.01));
        assert!(!TestRecord::pass_from_p(Some(0.005), 0.01));
        assert!(!TestRecord::pass_from_p(None, 0.01));
    }

    #[test]
    fn test_record_uses_smallest_p_value() {
        let r = TestRecord::from_p_values("serial", vec![0.4, 0.02]);
        assert!(r.passed);
        assert_eq!(r.p_value, 0.02);
        assert_eq!(r.p_values, vec![0.4, 0.02]);
    }

    #[test]
    fn test_record_fails_if_any_p_value_low() {
        let r = TestRecord::from_p_values("serial", vec![0.9, 0.001]);
        assert!(!r.passed);
        assert_eq!(r.p_value, 0.001);
    }

    #[test]
    fn test_record_single_p_value_has_no_list() {
        let r = TestRecord::from_p_values("monobit", vec![0.5]);
        assert!(r.p_values.is_empty());
        assert_eq!(r.p_value, 0.5);
    }

    #[test]
    fn test_summary_ratio() {
        let records = vec![
            TestRecord::from_p_values("a", vec![0.5]),
            TestRecord::from_p_values("b", vec![0.0001]),
        ];
        let s = BatterySummary::from_records(&records, 2, 15);
        assert_eq!(s.passed, 1);
        assert_eq!(s.total, 15);
        assert!((s.ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_summary_nothing_eligible() {
        let s = BatterySummary::from_records(&[], 0, 15);
        assert_eq!(s.ratio, 0.0);
    }

    #[test]
    fn test_igamc_edges() {
        assert_eq!(igamc(2.0, 0.0), 1.0);
        assert_eq!(igamc(2.0, f64::INFINITY), 0.0);
        // Q(1, x) = exp(-x)
        assert!((igamc(1.0, 2.0) - (-2.0f64).exp()).abs() < 1e-10);
    }
}
