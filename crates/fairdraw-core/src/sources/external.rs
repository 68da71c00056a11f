//! Adapter for fetchers that live outside this crate.
//!
//! News feeds, weather aggregates and satellite imagery are fetched by the
//! embedding application. Each one plugs in as an [`ExternalSource`]: a
//! name, a category and a closure returning payload records.

use std::path::PathBuf;

use crate::error::SourceError;
use crate::source::{EntropySource, SourceCategory, SourceInfo, SourcePayload};

type FetchFn = dyn Fn() -> Result<Vec<SourcePayload>, SourceError> + Send + Sync;

pub struct ExternalSource {
    info: SourceInfo,
    fetch: Box<FetchFn>,
}

impl ExternalSource {
    pub fn new<F>(name: &'static str, category: SourceCategory, fetch: F) -> Self
    where
        F: Fn() -> Result<Vec<SourcePayload>, SourceError> + Send + Sync + 'static,
    {
        Self {
            info: SourceInfo {
                name,
                description: "externally fetched payload",
                category,
                remote: true,
            },
            fetch: Box::new(fetch),
        }
    }

    /// A source that reads a local file on every fetch, one record per read.
    /// Useful for replaying captured feed or sensor dumps.
    pub fn from_file(name: &'static str, category: SourceCategory, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut source = Self::new(name, category, move || {
            let bytes = std::fs::read(&path)
                .map_err(|e| SourceError::Fetch(format!("{}: {e}", path.display())))?;
            Ok(vec![
                SourcePayload::new(name, bytes).with_meta("path", path.display().to_string()),
            ])
        });
        source.info.description = "payload read from a local file";
        source.info.remote = false;
        source
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.info.description = description;
        self
    }
}

impl EntropySource for ExternalSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn fetch(&self) -> Result<Vec<SourcePayload>, SourceError> {
        (self.fetch)()
    }
}
