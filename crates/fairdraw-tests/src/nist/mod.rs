//! The SP 800-22 rev1a battery.
//!
//! The battery is a closed set of fifteen tests, [`NistTest`], listed in the
//! static table [`SP800_22_BATTERY`]. Each exposes the [`RandomnessTest`]
//! capability: an eligibility predicate over the candidate sequence and an
//! `execute` that yields one or more p-values.
//!
//! Running the battery is three steps: eligibility for every test, execution
//! of the eligible ones, aggregation into a [`BatterySummary`]. Short input is
//! never extended; tests that need more bits are simply ineligible.

mod frequency;
mod pattern;
mod structure;
mod walk;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use crate::{BatterySummary, TestError, TestRecord};

/// Capability shared by every battery member.
pub trait RandomnessTest {
    /// Stable identifier, used in records and stage events.
    fn name(&self) -> &'static str;

    /// Whether the sequence is long enough (and structured enough) for this
    /// test to be meaningful.
    fn is_eligible(&self, bits: &[u8]) -> bool;

    /// Compute the test's p-values. Callers must check eligibility first.
    fn execute(&self, bits: &[u8]) -> Result<Vec<f64>, TestError>;

    /// Execute and fold the p-values into a record.
    fn run(&self, bits: &[u8]) -> Result<TestRecord, TestError> {
        let p_values = self.execute(bits)?;
        if p_values.is_empty() {
            return Err(TestError::Numerical("no p-values produced".into()));
        }
        if let Some(bad) = p_values.iter().find(|p| !p.is_finite()) {
            return Err(TestError::Numerical(format!("non-finite p-value {bad}")));
        }
        let clamped = p_values.into_iter().map(|p| p.clamp(0.0, 1.0)).collect();
        Ok(TestRecord::from_p_values(self.name(), clamped))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NistTest {
    Monobit,
    FrequencyWithinBlock,
    Runs,
    LongestRunOnesInABlock,
    BinaryMatrixRank,
    Dft,
    NonOverlappingTemplateMatching,
    OverlappingTemplateMatching,
    MaurersUniversal,
    LinearComplexity,
    Serial,
    ApproximateEntropy,
    CumulativeSums,
    RandomExcursion,
    RandomExcursionVariant,
}

/// Registry table, in execution order.
pub static SP800_22_BATTERY: [NistTest; 15] = [
    NistTest::Monobit,
    NistTest::FrequencyWithinBlock,
    NistTest::Runs,
    NistTest::LongestRunOnesInABlock,
    NistTest::BinaryMatrixRank,
    NistTest::Dft,
    NistTest::NonOverlappingTemplateMatching,
    NistTest::OverlappingTemplateMatching,
    NistTest::MaurersUniversal,
    NistTest::LinearComplexity,
    NistTest::Serial,
    NistTest::ApproximateEntropy,
    NistTest::CumulativeSums,
    NistTest::RandomExcursion,
    NistTest::RandomExcursionVariant,
];

impl RandomnessTest for NistTest {
    fn name(&self) -> &'static str {
        match self {
            Self::Monobit => "monobit",
            Self::FrequencyWithinBlock => "frequency_within_block",
            Self::Runs => "runs",
            Self::LongestRunOnesInABlock => "longest_run_ones_in_a_block",
            Self::BinaryMatrixRank => "binary_matrix_rank",
            Self::Dft => "dft",
            Self::NonOverlappingTemplateMatching => "non_overlapping_template_matching",
            Self::OverlappingTemplateMatching => "overlapping_template_matching",
            Self::MaurersUniversal => "maurers_universal",
            Self::LinearComplexity => "linear_complexity",
            Self::Serial => "serial",
            Self::ApproximateEntropy => "approximate_entropy",
            Self::CumulativeSums => "cumulative_sums",
            Self::RandomExcursion => "random_excursion",
            Self::RandomExcursionVariant => "random_excursion_variant",
        }
    }

    fn is_eligible(&self, bits: &[u8]) -> bool {
        let n = bits.len();
        match self {
            Self::Monobit | Self::FrequencyWithinBlock | Self::Runs | Self::CumulativeSums => {
                n >= 100
            }
            Self::LongestRunOnesInABlock => n >= 128,
            Self::BinaryMatrixRank => n >= structure::RANK_MIN_BITS,
            Self::Dft => n >= 1000,
            Self::NonOverlappingTemplateMatching => n >= pattern::NON_OVERLAPPING_MIN_BITS,
            Self::OverlappingTemplateMatching => n >= pattern::OVERLAPPING_MIN_BITS,
            Self::MaurersUniversal => pattern::maurer_block_length(n).is_some(),
            Self::LinearComplexity => n >= structure::LINEAR_COMPLEXITY_MIN_BITS,
            Self::Serial => n >= 21 * (1 << pattern::SERIAL_PATTERN_LENGTH),
            Self::ApproximateEntropy => n >= 1 << (pattern::APEN_PATTERN_LENGTH + 6),
            Self::RandomExcursion | Self::RandomExcursionVariant => {
                n >= walk::EXCURSION_MIN_BITS && walk::cycle_count(bits) >= walk::EXCURSION_MIN_CYCLES
            }
        }
    }

    fn execute(&self, bits: &[u8]) -> Result<Vec<f64>, TestError> {
        match self {
            Self::Monobit => frequency::monobit(bits),
            Self::FrequencyWithinBlock => frequency::frequency_within_block(bits),
            Self::Runs => frequency::runs(bits),
            Self::LongestRunOnesInABlock => frequency::longest_run_ones(bits),
            Self::BinaryMatrixRank => structure::binary_matrix_rank(bits),
            Self::Dft => structure::dft(bits),
            Self::NonOverlappingTemplateMatching => pattern::non_overlapping_template(bits),
            Self::OverlappingTemplateMatching => pattern::overlapping_template(bits),
            Self::MaurersUniversal => pattern::maurers_universal(bits),
            Self::LinearComplexity => structure::linear_complexity(bits),
            Self::Serial => pattern::serial(bits),
            Self::ApproximateEntropy => pattern::approximate_entropy(bits),
            Self::CumulativeSums => walk::cumulative_sums(bits),
            Self::RandomExcursion => walk::random_excursion(bits),
            Self::RandomExcursionVariant => walk::random_excursion_variant(bits),
        }
    }
}

/// Eligibility of every registered test against `bits`, in table order.
pub fn check_eligibility(bits: &[u8]) -> Vec<(NistTest, bool)> {
    SP800_22_BATTERY
        .iter()
        .map(|&t| (t, t.is_eligible(bits)))
        .collect()
}

/// Progress notifications emitted while the battery runs.
#[derive(Debug)]
pub enum BatteryEvent<'a> {
    Eligibility { eligible: usize, total: usize },
    Started { name: &'static str },
    Finished { record: &'a TestRecord, elapsed_ms: f64 },
    Failed { name: &'static str, error: &'a TestError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatteryRun {
    pub records: Vec<TestRecord>,
    pub summary: BatterySummary,
}

/// Run the full battery. A test that errors or panics is reported through
/// `observer` and left out of the records; the rest of the battery continues.
pub fn run_battery(bits: &[u8], mut observer: impl FnMut(BatteryEvent<'_>)) -> BatteryRun {
    let eligibility = check_eligibility(bits);
    let eligible: Vec<NistTest> = eligibility
        .iter()
        .filter(|(_, ok)| *ok)
        .map(|(t, _)| *t)
        .collect();
    let total = eligibility.len();
    observer(BatteryEvent::Eligibility {
        eligible: eligible.len(),
        total,
    });

    let mut records = Vec::with_capacity(eligible.len());
    for test in &eligible {
        let name = test.name();
        observer(BatteryEvent::Started { name });
        let t0 = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| test.run(bits)))
            .unwrap_or(Err(TestError::Panicked));
        match outcome {
            Ok(record) => {
                let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
                observer(BatteryEvent::Finished {
                    record: &record,
                    elapsed_ms,
                });
                records.push(record);
            }
            Err(error) => {
                log::warn!("nist test {name} excluded: {error}");
                observer(BatteryEvent::Failed {
                    name,
                    error: &error,
                });
            }
        }
    }

    let summary = BatterySummary::from_records(&records, eligible.len(), total);
    BatteryRun { records, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pseudo_random_bits;

    #[test]
    fn test_registry_names_unique() {
        let mut names: Vec<&str> = SP800_22_BATTERY.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn test_short_sequence_eligibility() {
        let bits = pseudo_random_bits(100);
        let eligible: Vec<&str> = check_eligibility(&bits)
            .into_iter()
            .filter(|(_, ok)| *ok)
            .map(|(t, _)| t.name())
            .collect();
        assert_eq!(
            eligible,
            vec!["monobit", "frequency_within_block", "runs", "cumulative_sums"]
        );
        for t in [
            NistTest::OverlappingTemplateMatching,
            NistTest::LinearComplexity,
            NistTest::RandomExcursion,
            NistTest::RandomExcursionVariant,
        ] {
            assert!(!t.is_eligible(&bits), "{} should need 10^6 bits", t.name());
        }
    }

    #[test]
    fn test_ineligible_tests_do_not_dilute_ratio() {
        let bits = pseudo_random_bits(100);
        let run = run_battery(&bits, |_| {});
        assert_eq!(run.summary.total, 15);
        assert_eq!(run.summary.eligible, 4);
        assert_eq!(run.records.len(), 4);
        let expected = run.records.iter().filter(|r| r.passed).count() as f64 / 4.0;
        assert!((run.summary.ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sequence_runs_nothing() {
        let run = run_battery(&[], |_| {});
        assert_eq!(run.summary.eligible, 0);
        assert!(run.records.is_empty());
        assert_eq!(run.summary.ratio, 0.0);
    }

    #[test]
    fn test_observer_sees_every_eligible_test() {
        let bits = pseudo_random_bits(4096);
        let mut started = Vec::new();
        let mut finished = 0;
        let mut eligibility = None;
        let run = run_battery(&bits, |event| match event {
            BatteryEvent::Eligibility { eligible, total } => eligibility = Some((eligible, total)),
            BatteryEvent::Started { name } => started.push(name),
            BatteryEvent::Finished { .. } => finished += 1,
            BatteryEvent::Failed { .. } => {}
        });
        let (eligible, total) = eligibility.expect("eligibility event");
        assert_eq!(total, 15);
        assert_eq!(started.len(), eligible);
        assert_eq!(finished, run.records.len());
        assert!(started.contains(&"serial"));
        assert!(started.contains(&"dft"));
    }

    #[test]
    fn test_constant_sequence_fails_frequency_tests() {
        let bits = vec![1u8; 4096];
        let run = run_battery(&bits, |_| {});
        let monobit = run.records.iter().find(|r| r.name == "monobit").unwrap();
        assert!(!monobit.passed);
        assert!(run.summary.ratio < 0.5);
    }

    struct Exploding;

    impl RandomnessTest for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn is_eligible(&self, _bits: &[u8]) -> bool {
            true
        }
        fn execute(&self, _bits: &[u8]) -> Result<Vec<f64>, TestError> {
            Ok(vec![f64::NAN])
        }
    }

    #[test]
    fn test_non_finite_p_value_is_an_error() {
        let err = Exploding.run(&[0, 1]).unwrap_err();
        assert!(matches!(err, TestError::Numerical(_)));
    }
}
