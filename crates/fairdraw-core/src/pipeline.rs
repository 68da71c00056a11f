//! The synchronous draw and NIST pipelines.
//!
//! Both are plain blocking functions that report progress through a
//! [`StageLogger`]. Scheduling, job state and transport belong to the caller.

use fairdraw_tests::{
    BatteryEvent, BatterySummary, QuickReport, SP800_22_BATTERY, TestRecord, quick_battery,
    run_battery,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bits::BitStream;
use crate::commitment::derive_logged;
use crate::conditioning::whiten_to_target;
use crate::error::{CoreError, Result};
use crate::pool::collect_entropy;
use crate::sampler::{SAMPLER_ALGORITHM, sample_logged};
use crate::source::SourceRegistry;
use crate::stage::StageLogger;

/// Largest whitened length a single draw may request.
pub const MAX_DRAW_BITS: usize = 10_000_000;
/// Most numbers a single draw may pick. The sampler keeps every pick in
/// memory, so this bounds a draw's footprint regardless of `max_number`.
pub const MAX_DRAW_NUMBERS: usize = 10_000;

/// Parameters of one draw. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    pub sources: Vec<String>,
    /// Whitened bits to produce.
    pub bits: usize,
    /// How many numbers to draw.
    pub numbers: usize,
    pub max_number: u64,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            sources: vec!["os".into(), "time".into()],
            bits: 4096,
            numbers: 6,
            max_number: 49,
        }
    }
}

impl DrawConfig {
    /// Reject configs that could never complete, before any job exists.
    pub fn validate(&self, registry: &SourceRegistry) -> Result<()> {
        let invalid = |msg: String| Err(CoreError::InvalidConfig(msg));
        if self.sources.is_empty() {
            return invalid("at least one source is required".into());
        }
        if let Some(unknown) = self.sources.iter().find(|s| !registry.contains(s)) {
            return invalid(format!(
                "unknown source {unknown:?} (available: {})",
                registry.names().join(", ")
            ));
        }
        if self.bits == 0 || self.bits > MAX_DRAW_BITS {
            return invalid(format!("bits must be in 1..={MAX_DRAW_BITS}"));
        }
        if self.numbers > MAX_DRAW_NUMBERS {
            return invalid(format!("numbers must be at most {MAX_DRAW_NUMBERS}"));
        }
        if self.numbers == 0 || self.max_number == 0 || self.numbers as u64 > self.max_number {
            return invalid(format!(
                "cannot draw {} distinct numbers from 1..={}",
                self.numbers, self.max_number
            ));
        }
        Ok(())
    }
}

/// NIST battery output as published in results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NistReport {
    pub summary: BatterySummary,
    pub tests: Vec<TestRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawTests {
    pub quick: QuickReport,
    pub nist: NistReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub draw: Vec<u64>,
    pub fingerprint: String,
    pub algorithm: String,
    /// The exact whitened bits the seed was derived from.
    pub bits: BitStream,
    pub tests: DrawTests,
}

/// Run the full NIST battery over `bits`, reporting every step.
pub fn run_nist(bits: &BitStream, logger: &StageLogger<'_>) -> NistReport {
    logger.stage("nist:start", json!({"length": bits.len()}));
    let raw = bits.to_bit_vec();
    let run = run_battery(&raw, |event| match event {
        BatteryEvent::Eligibility { eligible, total } => {
            logger.stage("nist:eligibility", json!({"eligible": eligible, "total": total}));
        }
        BatteryEvent::Started { name } => {
            logger.stage("nist:run:test", json!({"name": name}));
        }
        BatteryEvent::Finished { record, elapsed_ms } => {
            logger.stage(
                "nist:test",
                json!({
                    "name": record.name,
                    "passed": record.passed,
                    "p_value": record.p_value,
                    "elapsed_ms": elapsed_ms,
                }),
            );
        }
        BatteryEvent::Failed { name, error } => {
            logger.stage("nist:test:error", json!({"name": name, "error": error.to_string()}));
        }
    });
    logger.stage("nist:summary", json!(run.summary));
    log::info!(
        "nist battery: {}/{} eligible tests passed ({} registered)",
        run.summary.passed,
        run.summary.eligible,
        SP800_22_BATTERY.len()
    );
    NistReport {
        summary: run.summary,
        tests: run.records,
    }
}

/// Entropy → whitening → seed → draw → tests.
pub fn run_draw(
    config: &DrawConfig,
    registry: &SourceRegistry,
    logger: &StageLogger<'_>,
) -> Result<DrawOutcome> {
    config.validate(registry)?;

    let mut source_bits = 0;
    let bits = whiten_to_target(config.bits, logger, |batch| {
        let collected = collect_entropy(registry, &config.sources, batch, logger);
        source_bits += collected.source_bits;
        collected.bits
    })?;
    // Without any source data the stream is a public hash chain.
    if source_bits == 0 {
        return Err(CoreError::NoEntropy);
    }

    let commitment = derive_logged(&bits, logger);
    let draw = sample_logged(&commitment.seed, config.numbers, config.max_number, logger)?;

    let raw = bits.to_bit_vec();
    let quick = quick_battery(&raw);
    logger.stage("tests:quick", json!(quick.summary));
    logger.stage("tests:start", json!({"suite": "NIST SP 800-22"}));
    let nist = run_nist(&bits, logger);
    logger.stage(
        "tests:done",
        json!({"suite": "NIST SP 800-22", "summary": nist.summary}),
    );

    Ok(DrawOutcome {
        draw,
        fingerprint: commitment.fingerprint,
        algorithm: SAMPLER_ALGORITHM.to_string(),
        bits,
        tests: DrawTests { quick, nist },
    })
}
