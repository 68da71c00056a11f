//! Entropy source contract and registry.
//!
//! Every entropy source implements [`EntropySource`]. A fetch yields zero or
//! more [`SourcePayload`] records; the aggregator hashes each record into one
//! 256-bit chunk, so heterogeneous payloads (feed text, sensor aggregates,
//! image bytes, timer samples) all contribute uniformly sized chunks.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::SourceError;

/// Fixed order in which known sources are consulted, independent of the
/// order a caller lists them in.
pub const CANONICAL_ORDER: [&str; 6] = ["news", "weather", "solar", "meteo_sat", "os", "time"];

/// Category of entropy source by where its bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCategory {
    /// Text feeds (news headlines and similar).
    Feed,
    /// Environmental measurements.
    Environment,
    /// Downloaded imagery plus transport metadata.
    Imagery,
    /// Operating system CSPRNG.
    System,
    /// Local timer jitter.
    Timing,
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feed => write!(f, "feed"),
            Self::Environment => write!(f, "environment"),
            Self::Imagery => write!(f, "imagery"),
            Self::System => write!(f, "system"),
            Self::Timing => write!(f, "timing"),
        }
    }
}

/// Metadata about an entropy source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Unique identifier (e.g. `"os"`), also used in stage names.
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    pub category: SourceCategory,
    /// Whether fetching goes over the network.
    pub remote: bool,
}

/// One record returned by a source fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePayload {
    pub name: String,
    pub bytes: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}

impl SourcePayload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `SHA256(name ‖ metadata-line ‖ bytes)`, where metadata-line is the
    /// `k=v` pairs in key order joined by `|`.
    pub fn digest(&self) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(self.name.as_bytes());
        let line = self
            .metadata
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("|");
        h.update(line.as_bytes());
        h.update(&self.bytes);
        h.finalize().into()
    }
}

/// Trait that every entropy source must implement.
pub trait EntropySource: Send + Sync {
    /// Source metadata.
    fn info(&self) -> &SourceInfo;

    /// Fetch raw payload records. May fail; the caller treats failure as a
    /// zero contribution.
    fn fetch(&self) -> Result<Vec<SourcePayload>, SourceError>;

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

fn canonical_rank(name: &str) -> usize {
    CANONICAL_ORDER
        .iter()
        .position(|&n| n == name)
        .unwrap_or(CANONICAL_ORDER.len())
}

/// Named set of sources, kept in canonical order. Names outside
/// [`CANONICAL_ORDER`] follow the known ones in registration order.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn EntropySource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source, replacing any existing source with the same name.
    pub fn register(&mut self, source: Arc<dyn EntropySource>) {
        self.sources.retain(|s| s.name() != source.name());
        let rank = canonical_rank(source.name());
        let at = self
            .sources
            .iter()
            .position(|s| canonical_rank(s.name()) > rank)
            .unwrap_or(self.sources.len());
        self.sources.insert(at, source);
    }

    pub fn with(mut self, source: impl EntropySource + 'static) -> Self {
        self.register(Arc::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.name() == name)
    }

    pub fn infos(&self) -> Vec<SourceInfo> {
        self.sources.iter().map(|s| s.info().clone()).collect()
    }

    /// The requested sources in registry order. Unknown names are skipped.
    pub fn select(&self, names: &[String]) -> Vec<Arc<dyn EntropySource>> {
        self.sources
            .iter()
            .filter(|s| names.iter().any(|n| n == s.name()))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(SourceInfo);

    impl Named {
        fn new(name: &'static str) -> Self {
            Self(SourceInfo {
                name,
                description: "test",
                category: SourceCategory::System,
                remote: false,
            })
        }
    }

    impl EntropySource for Named {
        fn info(&self) -> &SourceInfo {
            &self.0
        }
        fn fetch(&self) -> Result<Vec<SourcePayload>, SourceError> {
            Ok(vec![SourcePayload::new(self.0.name, vec![1, 2, 3])])
        }
    }

    #[test]
    fn test_registry_uses_canonical_order() {
        let reg = SourceRegistry::new()
            .with(Named::new("time"))
            .with(Named::new("custom"))
            .with(Named::new("os"))
            .with(Named::new("news"));
        assert_eq!(reg.names(), vec!["news", "os", "time", "custom"]);
    }

    #[test]
    fn test_select_ignores_request_order() {
        let reg = SourceRegistry::new()
            .with(Named::new("os"))
            .with(Named::new("time"))
            .with(Named::new("weather"));
        let picked: Vec<_> = reg
            .select(&["time".into(), "weather".into(), "missing".into()])
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(picked, vec!["weather", "time"]);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let reg = SourceRegistry::new()
            .with(Named::new("os"))
            .with(Named::new("os"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_digest_covers_metadata() {
        let a = SourcePayload::new("weather", b"12.5".to_vec());
        let b = a.clone().with_meta("city", "Oslo");
        assert_ne!(a.digest(), b.digest());
        assert_eq!(b.digest(), b.clone().digest());
    }

    #[test]
    fn test_digest_without_metadata_is_plain_concat() {
        let p = SourcePayload::new("os", vec![0xAB]);
        let mut h = Sha256::new();
        h.update(b"os");
        h.update([0xAB]);
        let expected: [u8; 32] = h.finalize().into();
        assert_eq!(p.digest(), expected);
    }
}
