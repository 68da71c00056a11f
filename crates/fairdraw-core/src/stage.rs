//! Stage events: the ordered progress log every pipeline writes.
//!
//! Pipelines are synchronous and CPU-bound, so they never touch job state
//! directly. They hand each [`StageEvent`] to a [`StageSink`], usually one end
//! of a channel, and whoever owns the job drains the other end into its log.

use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One timestamped progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Seconds since the owning job started. Non-decreasing within a job.
    pub elapsed: f64,
    pub stage: String,
    pub data: Value,
}

/// Receiver of stage events. Implementations must be cheap and must not block.
pub trait StageSink {
    fn emit(&self, event: StageEvent);
}

/// Collects events in memory. Used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StageEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StageEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.stage).collect()
    }
}

impl StageSink for MemorySink {
    fn emit(&self, event: StageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Discards everything.
pub struct NullSink;

impl StageSink for NullSink {
    fn emit(&self, _event: StageEvent) {}
}

/// Stamps events with the elapsed time since a fixed start and forwards them.
pub struct StageLogger<'a> {
    start: Instant,
    sink: &'a dyn StageSink,
}

impl<'a> StageLogger<'a> {
    pub fn new(sink: &'a dyn StageSink) -> Self {
        Self::starting_at(Instant::now(), sink)
    }

    /// A logger whose clock started at `start`, typically job creation.
    pub fn starting_at(start: Instant, sink: &'a dyn StageSink) -> Self {
        Self { start, sink }
    }

    pub fn stage(&self, name: impl Into<String>, data: Value) {
        let stage = name.into();
        log::debug!("stage {stage}: {data}");
        self.sink.emit(StageEvent {
            elapsed: self.start.elapsed().as_secs_f64(),
            stage,
            data,
        });
    }
}
