//! Built-in entropy sources plus the adapter for external fetchers.

mod helpers;

pub mod external;
pub mod os;
pub mod timing;

pub use external::ExternalSource;
pub use os::OsSource;
pub use timing::TimingSource;

use crate::source::SourceRegistry;

/// Registry holding the local sources every build can use: `os` and `time`.
/// Network-backed sources are registered by the embedding application.
pub fn default_registry() -> SourceRegistry {
    SourceRegistry::new().with(OsSource::new()).with(TimingSource::new())
}
