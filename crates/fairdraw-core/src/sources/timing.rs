//! TimingSource: a burst of high-resolution timestamps.
//!
//! Consecutive reads of a nanosecond clock differ by scheduler, cache and
//! frequency-scaling noise. The raw timestamps are hashed downstream, so no
//! delta or LSB extraction happens here.

use super::helpers::nanos;
use crate::error::SourceError;
use crate::source::{EntropySource, SourceCategory, SourceInfo, SourcePayload};

const TIMING_SAMPLES: usize = 4096;

pub struct TimingSource {
    samples: usize,
}

static TIMING_INFO: SourceInfo = SourceInfo {
    name: "time",
    description: "High-resolution timer samples",
    category: SourceCategory::Timing,
    remote: false,
};

impl TimingSource {
    pub fn new() -> Self {
        Self {
            samples: TIMING_SAMPLES,
        }
    }
}

impl Default for TimingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for TimingSource {
    fn info(&self) -> &SourceInfo {
        &TIMING_INFO
    }

    fn fetch(&self) -> Result<Vec<SourcePayload>, SourceError> {
        let mut bytes = Vec::with_capacity(self.samples * 8);
        for _ in 0..self.samples {
            bytes.extend_from_slice(&nanos().to_le_bytes());
        }
        Ok(vec![
            SourcePayload::new("time", bytes).with_meta("samples", self.samples.to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_source_single_record() {
        let records = TimingSource::new().fetch().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bytes.len(), TIMING_SAMPLES * 8);
        assert_eq!(records[0].metadata.get("samples").map(String::as_str), Some("4096"));
    }

    #[test]
    fn test_timestamps_little_endian_non_decreasing() {
        let records = TimingSource::new().fetch().unwrap();
        let stamps: Vec<u64> = records[0]
            .bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert!(stamps.windows(2).all(|w| w[1] >= w[0]));
    }
}
