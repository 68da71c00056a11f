//! OsSource: chunks from the operating system CSPRNG.

use crate::error::SourceError;
use crate::source::{EntropySource, SourceCategory, SourceInfo, SourcePayload};

/// Number of separate OS reads per fetch.
const OS_CHUNKS: usize = 16;
/// Bytes per OS read.
const OS_CHUNK_BYTES: usize = 32;

/// Reads `OS_CHUNKS` independent 32-byte chunks via `getrandom`, one payload
/// record each.
pub struct OsSource;

static OS_INFO: SourceInfo = SourceInfo {
    name: "os",
    description: "Operating system CSPRNG (getrandom)",
    category: SourceCategory::System,
    remote: false,
};

impl OsSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for OsSource {
    fn info(&self) -> &SourceInfo {
        &OS_INFO
    }

    fn fetch(&self) -> Result<Vec<SourcePayload>, SourceError> {
        (0..OS_CHUNKS)
            .map(|_| -> Result<SourcePayload, SourceError> {
                let mut buf = vec![0u8; OS_CHUNK_BYTES];
                getrandom::fill(&mut buf).map_err(|e| SourceError::Fetch(e.to_string()))?;
                Ok(SourcePayload::new("os", buf))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_source_fetch_shape() {
        let records = OsSource::new().fetch().unwrap();
        assert_eq!(records.len(), OS_CHUNKS);
        assert!(records.iter().all(|r| r.bytes.len() == OS_CHUNK_BYTES));
        // 32 random bytes colliding is not a realistic outcome.
        assert_ne!(records[0].bytes, records[1].bytes);
    }
}
