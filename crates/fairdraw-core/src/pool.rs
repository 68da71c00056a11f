//! Entropy aggregation.
//!
//! 1. Fetch every requested source, in registry (canonical) order
//! 2. Hash each payload record into a 256-bit chunk and concatenate
//! 3. Absorb per-source failures and panics as zero contribution
//! 4. If short, extend deterministically by iterated SHA-256
//! 5. Truncate to exactly the requested length

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::bits::BitStream;
use crate::error::SourceError;
use crate::source::{EntropySource, SourceRegistry};
use crate::stage::StageLogger;

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    /// Exactly the requested number of bits.
    pub bits: BitStream,
    /// Bits that came from sources before any expansion.
    pub source_bits: usize,
}

fn fetch_one(source: &dyn EntropySource) -> Result<BitStream, SourceError> {
    let payloads = catch_unwind(AssertUnwindSafe(|| source.fetch()))
        .unwrap_or(Err(SourceError::Panicked))?;
    if payloads.is_empty() {
        return Err(SourceError::Empty);
    }
    let mut bits = BitStream::with_capacity(payloads.len() * 256);
    for payload in &payloads {
        bits.extend_from_bytes(&payload.digest());
    }
    Ok(bits)
}

/// Deterministically extend `bits` to at least `target` bits, then truncate.
///
/// The first digest hashes the ASCII form of `bits`; every later digest hashes
/// the previous digest. Each digest contributes its 256 bits in order.
pub fn expand(bits: &BitStream, target: usize) -> BitStream {
    let mut out = bits.clone();
    let mut seed: Vec<u8> = bits.to_string().into_bytes();
    while out.len() < target {
        let digest: [u8; 32] = Sha256::digest(&seed).into();
        out.extend_from_bytes(&digest);
        seed = digest.to_vec();
    }
    out.truncate(target);
    out
}

/// Collect exactly `min_bits` bits from the named sources.
///
/// Never fails: a failing source is logged and contributes nothing, and any
/// shortfall is covered by [`expand`].
pub fn collect_entropy(
    registry: &SourceRegistry,
    names: &[String],
    min_bits: usize,
    logger: &StageLogger<'_>,
) -> Collected {
    let selected = registry.select(names);
    let order: Vec<&str> = selected.iter().map(|s| s.name()).collect();
    logger.stage("entropy:start", json!({"sources": order, "min_bits": min_bits}));

    let mut bits = BitStream::with_capacity(min_bits);
    for source in &selected {
        let name = source.name();
        logger.stage(format!("entropy:{name}:fetch"), json!({}));
        match fetch_one(source.as_ref()) {
            Ok(chunk) => {
                logger.stage(
                    format!("entropy:{name}:done"),
                    json!({"records": chunk.len() / 256, "bits": chunk.len()}),
                );
                bits.append(&chunk);
            }
            Err(e) => {
                log::warn!("entropy source {name} failed: {e}");
                logger.stage(format!("entropy:{name}:error"), json!({"error": e.to_string()}));
            }
        }
    }

    let source_bits = bits.len();
    logger.stage("entropy:collected", json!({"bits": source_bits}));

    if source_bits < min_bits {
        logger.stage("entropy:expand", json!({"from_bits": source_bits}));
        bits = expand(&bits, min_bits);
        logger.stage("entropy:expanded", json!({"bits": bits.len()}));
    } else {
        bits.truncate(min_bits);
    }

    Collected { bits, source_bits }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceCategory, SourcePayload};
    use crate::sources::ExternalSource;
    use crate::stage::MemorySink;

    fn fixed(name: &'static str, records: usize) -> ExternalSource {
        ExternalSource::new(name, SourceCategory::Feed, move || {
            Ok((0..records)
                .map(|i| SourcePayload::new(name, vec![i as u8; 4]))
                .collect())
        })
    }

    fn failing(name: &'static str) -> ExternalSource {
        ExternalSource::new(name, SourceCategory::Feed, || {
            Err(SourceError::Fetch("connection refused".into()))
        })
    }

    fn panicking(name: &'static str) -> ExternalSource {
        ExternalSource::new(name, SourceCategory::Feed, || panic!("parser bug"))
    }

    #[test]
    fn test_expand_exact_length() {
        let base: BitStream = "1011".parse().unwrap();
        for target in [4, 5, 256, 257, 1000] {
            let out = expand(&base, target);
            assert_eq!(out.len(), target);
            assert!(out.to_string().starts_with("1011"));
        }
    }

    #[test]
    fn test_expand_chains_digests() {
        let base: BitStream = "1".parse().unwrap();
        let out = expand(&base, 1 + 512);
        let first: [u8; 32] = Sha256::digest(b"1").into();
        let second: [u8; 32] = Sha256::digest(first).into();
        let mut expected = base.clone();
        expected.extend_from_bytes(&first);
        expected.extend_from_bytes(&second);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_expand_deterministic() {
        let base: BitStream = "0110".parse().unwrap();
        assert_eq!(expand(&base, 700), expand(&base, 700));
    }

    #[test]
    fn test_collect_exact_length_and_order() {
        let reg = SourceRegistry::new().with(fixed("weather", 2)).with(fixed("news", 1));
        let sink = MemorySink::new();
        let logger = StageLogger::new(&sink);
        let out = collect_entropy(&reg, &["weather".into(), "news".into()], 768, &logger);
        assert_eq!(out.bits.len(), 768);
        assert_eq!(out.source_bits, 768);

        let news = SourcePayload::new("news", vec![0; 4]).digest();
        assert_eq!(&out.bits.as_bytes()[..32], &news);
        assert_eq!(
            sink.stages(),
            vec![
                "entropy:start",
                "entropy:news:fetch",
                "entropy:news:done",
                "entropy:weather:fetch",
                "entropy:weather:done",
                "entropy:collected",
            ]
        );
    }

    #[test]
    fn test_failing_sources_are_absorbed() {
        let reg = SourceRegistry::new()
            .with(failing("news"))
            .with(panicking("weather"))
            .with(fixed("os", 1));
        let sink = MemorySink::new();
        let logger = StageLogger::new(&sink);
        let names: Vec<String> = vec!["news".into(), "weather".into(), "os".into()];
        let out = collect_entropy(&reg, &names, 1024, &logger);
        assert_eq!(out.bits.len(), 1024);
        assert_eq!(out.source_bits, 256);
        let stages = sink.stages();
        assert!(stages.contains(&"entropy:news:error".to_string()));
        assert!(stages.contains(&"entropy:weather:error".to_string()));
        assert!(stages.contains(&"entropy:expand".to_string()));
        assert_eq!(stages.last().map(String::as_str), Some("entropy:expanded"));
    }

    #[test]
    fn test_empty_payload_is_an_error() {
        let reg = SourceRegistry::new().with(fixed("news", 0));
        let sink = MemorySink::new();
        let out = collect_entropy(&reg, &["news".into()], 16, &StageLogger::new(&sink));
        assert_eq!(out.source_bits, 0);
        assert_eq!(out.bits.len(), 16);
        let events = sink.events();
        let err = events.iter().find(|e| e.stage == "entropy:news:error").unwrap();
        assert_eq!(err.data["error"], "source returned no payload");
    }
}
