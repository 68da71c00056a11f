//! # fairdraw-core
//!
//! A draw turns a handful of weak, public entropy sources into a short list
//! of distinct numbers that anyone can re-derive after the fact.
//!
//! ## Pipeline
//!
//! Sources → aggregate (SHA-256 per record) → von Neumann whitening →
//! seed = SHA-256(bits) → ChaCha20 + Floyd sampling → randomness tests
//!
//! ```no_run
//! use fairdraw_core::{DrawConfig, MemorySink, StageLogger, default_registry, run_draw};
//!
//! let sink = MemorySink::new();
//! let outcome = run_draw(&DrawConfig::default(), &default_registry(), &StageLogger::new(&sink))
//!     .expect("draw failed");
//! println!("{:?} {}", outcome.draw, outcome.fingerprint);
//! ```
//!
//! The published fingerprint is `hex(SHA256(seed ‖ "|commit_v1"))`. Given the
//! whitened bits, [`verify`] recomputes it and [`sample`] recomputes the draw.

pub mod audit;
pub mod bits;
pub mod commitment;
pub mod conditioning;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod sampler;
pub mod source;
pub mod sources;
pub mod stage;

pub use audit::{AuditInput, AuditReport, AuditRequest, analyze, numbers_to_bits};
pub use bits::{BitStream, ParseBitsError};
pub use commitment::{COMMIT_DOMAIN_TAG, Commitment, derive, verify};
pub use conditioning::{von_neumann_extract, whiten_to_target};
pub use error::{CoreError, Result, SourceError};
pub use pipeline::{DrawConfig, DrawOutcome, DrawTests, MAX_DRAW_BITS, MAX_DRAW_NUMBERS, NistReport, run_draw, run_nist};
pub use pool::{Collected, collect_entropy, expand};
pub use sampler::{SAMPLER_ALGORITHM, sample};
pub use source::{
    CANONICAL_ORDER, EntropySource, SourceCategory, SourceInfo, SourcePayload, SourceRegistry,
};
pub use sources::{ExternalSource, OsSource, TimingSource, default_registry};
pub use stage::{MemorySink, NullSink, StageEvent, StageLogger, StageSink};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
