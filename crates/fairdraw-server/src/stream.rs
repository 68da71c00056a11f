//! Progress replay: ordered stage events from a cursor, closed by one
//! synthetic `final` event once the job is terminal.
//!
//! The same reader backs both transports: the pull endpoint returns one batch
//! per request, the SSE endpoint polls until the final event has been sent.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use fairdraw_core::StageEvent;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::jobs::JobHandle;

/// One read of a job's log.
#[derive(Debug, Serialize)]
pub struct ProgressBatch {
    pub events: Vec<StageEvent>,
    pub next_cursor: usize,
    #[serde(rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_event: Option<Value>,
}

pub struct ProgressReader {
    job: JobHandle,
    cursor: usize,
}

impl ProgressReader {
    pub fn new(job: JobHandle, cursor: usize) -> Self {
        Self { job, cursor }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Events appended since the last read. The final payload is attached
    /// once the job is terminal; status and log are read under one lock, so
    /// no event can follow it.
    pub async fn read(&mut self) -> ProgressBatch {
        let job = self.job.lock().await;
        let start = self.cursor.min(job.stages.len());
        let events = job.stages[start..].to_vec();
        self.cursor = job.stages.len();
        let final_event = job.status.is_terminal().then(|| job.final_payload());
        ProgressBatch {
            events,
            next_cursor: self.cursor,
            final_event,
        }
    }
}

fn sse_event(name: &str, data: &impl Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// SSE stream of every stage event from the start of the log, then `final`.
pub fn sse_events(
    reader: ProgressReader,
    poll: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    let state = (reader, VecDeque::new(), false);
    futures::stream::unfold(state, move |(mut reader, mut pending, mut done)| async move {
        loop {
            if let Some(event) = pending.pop_front() {
                return Some((Ok(event), (reader, pending, done)));
            }
            if done {
                return None;
            }
            let batch = reader.read().await;
            for event in &batch.events {
                pending.push_back(sse_event(&event.stage, event));
            }
            if let Some(payload) = batch.final_event {
                pending.push_back(sse_event("final", &payload));
                done = true;
            } else if pending.is_empty() {
                tokio::time::sleep(poll).await;
            }
        }
    })
}
