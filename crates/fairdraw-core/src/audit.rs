//! Audit input: externally supplied sequences to be tested.

use fairdraw_tests::{QuickReport, quick_battery};
use serde::{Deserialize, Serialize};

use crate::bits::BitStream;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditInput {
    /// Free-form text; only `'0'` and `'1'` characters are kept.
    Bits(String),
    /// Integers packed at a uniform width.
    Numbers(Vec<u64>),
}

/// JSON body accepted by the audit endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub sequence_bits: Option<String>,
    #[serde(default)]
    pub numbers: Option<Vec<u64>>,
}

impl TryFrom<AuditRequest> for AuditInput {
    type Error = CoreError;

    /// A non-empty `sequence_bits` wins when both fields are present.
    fn try_from(req: AuditRequest) -> Result<Self> {
        match (req.sequence_bits, req.numbers) {
            (Some(bits), _) if !bits.is_empty() => Ok(Self::Bits(bits)),
            (_, Some(numbers)) => Ok(Self::Numbers(numbers)),
            (Some(_), None) | (None, None) => Err(CoreError::EmptyInput),
        }
    }
}

impl AuditInput {
    /// Convert to bits. Fails with [`CoreError::EmptyInput`] when nothing
    /// usable remains.
    pub fn to_bits(&self) -> Result<BitStream> {
        let bits = match self {
            Self::Bits(text) => BitStream::from_text_lenient(text),
            Self::Numbers(numbers) => numbers_to_bits(numbers)?,
        };
        if bits.is_empty() {
            return Err(CoreError::EmptyInput);
        }
        Ok(bits)
    }
}

/// Pack every number MSB-first at `width = max(1, bitlen(max(numbers)))`.
pub fn numbers_to_bits(numbers: &[u64]) -> Result<BitStream> {
    let largest = numbers.iter().copied().max().ok_or(CoreError::EmptyInput)?;
    let width = (u64::BITS - largest.leading_zeros()).max(1);
    let mut bits = BitStream::with_capacity(numbers.len() * width as usize);
    for &n in numbers {
        for shift in (0..width).rev() {
            bits.push((n >> shift) & 1 == 1);
        }
    }
    Ok(bits)
}

/// Synchronous quick analysis, the body of `POST /audit/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub status: String,
    pub length: usize,
    pub tests: QuickReport,
}

pub fn analyze(input: &AuditInput) -> Result<AuditReport> {
    let bits = input.to_bits()?;
    let tests = quick_battery(&bits.to_bit_vec());
    Ok(AuditReport {
        status: "ok".into(),
        length: bits.len(),
        tests,
    })
}
