//! Job orchestration.
//!
//! A job is `running` until its pipeline returns, then `completed` or `error`
//! exactly once. Pipelines run on the blocking pool behind a semaphore and
//! send stage events over a channel; a drain task appends them to the job's
//! log. The terminal status is written only after the drain has finished, so
//! a reader that sees a terminal status also sees the complete log.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fairdraw_core::{
    BitStream, CoreError, DrawConfig, DrawOutcome, DrawTests, NistReport, SourceRegistry,
    StageEvent, StageLogger, StageSink, run_draw, run_nist,
};
use fairdraw_tests::{BatterySummary, TestRecord};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock, Semaphore, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ServiceError;

pub type JobId = String;
pub type JobHandle = Arc<Mutex<Job>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Draw,
    Nist,
}

#[derive(Debug, Clone)]
pub enum JobOutput {
    Draw(Box<DrawOutcome>),
    Nist(NistReport),
}

/// Seconds since the Unix epoch.
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub started_at: f64,
    pub finished_at: Option<f64>,
    /// Draw parameters; `None` for NIST jobs.
    pub config: Option<DrawConfig>,
    /// Input length of a NIST job.
    pub length: usize,
    pub stages: Vec<StageEvent>,
    pub error: Option<String>,
    output: Option<JobOutput>,
    clock: Instant,
    finished: Option<Instant>,
}

/// Body of `GET /draw/result/{id}`.
#[derive(Debug, Serialize)]
pub struct DrawResult<'a> {
    pub job_id: &'a str,
    pub status: JobStatus,
    pub started_at: f64,
    pub finished_at: Option<f64>,
    pub config: Option<&'a DrawConfig>,
    pub stages: &'a [StageEvent],
    pub draw: Option<&'a [u64]>,
    pub fingerprint: Option<&'a str>,
    pub algorithm: Option<&'a str>,
    pub tests: Option<&'a DrawTests>,
    pub error: Option<&'a str>,
}

/// Body of `GET /audit/nist/result/{id}`.
#[derive(Debug, Serialize)]
pub struct NistResult<'a> {
    pub job_id: &'a str,
    pub status: JobStatus,
    pub started_at: f64,
    pub finished_at: Option<f64>,
    pub length: usize,
    pub tests: &'a [TestRecord],
    pub summary: BatterySummary,
    pub error: Option<&'a str>,
}

impl Job {
    fn new(kind: JobKind, config: Option<DrawConfig>, length: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            status: JobStatus::Running,
            started_at: unix_now(),
            finished_at: None,
            config,
            length,
            stages: Vec::new(),
            error: None,
            output: None,
            clock: Instant::now(),
            finished: None,
        }
    }

    fn finish(&mut self, outcome: Result<JobOutput, String>) {
        if self.status.is_terminal() {
            log::warn!("job {} finished twice; keeping first outcome", self.id);
            return;
        }
        match outcome {
            Ok(output) => {
                self.status = JobStatus::Completed;
                self.output = Some(output);
                log::info!("job {} completed ({} stages)", self.id, self.stages.len());
            }
            Err(err) => {
                self.status = JobStatus::Error;
                log::warn!("job {} failed: {err}", self.id);
                self.error = Some(err);
            }
        }
        self.finished_at = Some(unix_now());
        self.finished = Some(Instant::now());
    }

    fn draw_outcome(&self) -> Option<&DrawOutcome> {
        match &self.output {
            Some(JobOutput::Draw(outcome)) => Some(outcome.as_ref()),
            _ => None,
        }
    }

    fn nist_report(&self) -> Option<&NistReport> {
        match &self.output {
            Some(JobOutput::Nist(report)) => Some(report),
            _ => None,
        }
    }

    pub fn draw_result(&self) -> DrawResult<'_> {
        let outcome = self.draw_outcome();
        DrawResult {
            job_id: &self.id,
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            config: self.config.as_ref(),
            stages: &self.stages,
            draw: outcome.map(|o| o.draw.as_slice()),
            fingerprint: outcome.map(|o| o.fingerprint.as_str()),
            algorithm: outcome.map(|o| o.algorithm.as_str()),
            tests: outcome.map(|o| &o.tests),
            error: self.error.as_deref(),
        }
    }

    pub fn nist_result(&self) -> NistResult<'_> {
        let report = self.nist_report();
        NistResult {
            job_id: &self.id,
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            length: self.length,
            tests: report.map(|r| r.tests.as_slice()).unwrap_or_default(),
            summary: report.map(|r| r.summary).unwrap_or_default(),
            error: self.error.as_deref(),
        }
    }

    /// The whitened bits a draw used. Only available once completed.
    pub fn bits(&self) -> Result<&BitStream, ServiceError> {
        if self.status != JobStatus::Completed {
            return Err(ServiceError::NotCompleted);
        }
        self.draw_outcome()
            .map(|o| &o.bits)
            .ok_or_else(|| ServiceError::Internal(format!("job {} has no bits", self.id)))
    }

    /// Payload of the synthetic `final` progress event.
    pub fn final_payload(&self) -> Value {
        let mut payload = match self.kind {
            JobKind::Draw => {
                let outcome = self.draw_outcome();
                json!({
                    "status": self.status,
                    "result": {
                        "draw": outcome.map(|o| &o.draw),
                        "fingerprint": outcome.map(|o| &o.fingerprint),
                        "tests": outcome.map(|o| o.tests.nist.summary).unwrap_or_default(),
                    },
                })
            }
            JobKind::Nist => json!({
                "status": self.status,
                "summary": self.nist_report().map(|r| r.summary).unwrap_or_default(),
            }),
        };
        if let (Some(err), Some(obj)) = (&self.error, payload.as_object_mut()) {
            obj.insert("error".into(), json!(err));
        }
        payload
    }

    fn expired(&self, ttl: Duration) -> bool {
        self.finished.is_some_and(|t| t.elapsed() >= ttl)
    }
}

/// Forwards stage events from the blocking pipeline to the drain task.
struct ChannelSink(mpsc::UnboundedSender<StageEvent>);

impl StageSink for ChannelSink {
    fn emit(&self, event: StageEvent) {
        // The drain task outlives every sender.
        let _ = self.0.send(event);
    }
}

/// In-memory store of draw and NIST jobs plus the pool that runs them.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobHandle>>,
    workers: Arc<Semaphore>,
    sources: SourceRegistry,
    ttl: Duration,
}

impl JobRegistry {
    pub fn new(sources: SourceRegistry, workers: usize, ttl: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            sources,
            ttl,
        }
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of jobs still running.
    pub async fn active(&self) -> usize {
        let handles: Vec<JobHandle> = self.jobs.read().await.values().cloned().collect();
        let mut n = 0;
        for handle in handles {
            if !handle.lock().await.status.is_terminal() {
                n += 1;
            }
        }
        n
    }

    /// Look up a job of the given kind. A job of the other kind is not found.
    pub async fn get(&self, id: &str, kind: JobKind) -> Result<JobHandle, ServiceError> {
        let handle = self
            .jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(ServiceError::NotFound)?;
        if handle.lock().await.kind != kind {
            return Err(ServiceError::NotFound);
        }
        Ok(handle)
    }

    /// Validate `config` and start a draw job.
    pub async fn start_draw(&self, config: DrawConfig) -> Result<JobId, ServiceError> {
        config.validate(&self.sources)?;
        let (id, handle) = self
            .insert(Job::new(JobKind::Draw, Some(config.clone()), config.bits))
            .await;
        log::info!(
            "draw job {id} started: {} of 1..={} from {:?}",
            config.numbers,
            config.max_number,
            config.sources
        );
        let sources = self.sources.clone();
        self.execute(handle, move |logger| {
            run_draw(&config, &sources, logger).map(|o| JobOutput::Draw(Box::new(o)))
        });
        Ok(id)
    }

    /// Start a NIST job over `bits`.
    pub async fn start_nist(&self, bits: BitStream) -> Result<JobId, ServiceError> {
        if bits.is_empty() {
            return Err(CoreError::EmptyInput.into());
        }
        let (id, handle) = self.insert(Job::new(JobKind::Nist, None, bits.len())).await;
        log::info!("nist job {id} started over {} bits", bits.len());
        self.execute(handle, move |logger| Ok(JobOutput::Nist(run_nist(&bits, logger))));
        Ok(id)
    }

    /// Start a NIST job over the bits of a completed draw.
    pub async fn start_nist_for_draw(&self, draw_id: &str) -> Result<JobId, ServiceError> {
        let handle = self.get(draw_id, JobKind::Draw).await?;
        let bits = handle.lock().await.bits()?.clone();
        self.start_nist(bits).await
    }

    async fn insert(&self, job: Job) -> (JobId, JobHandle) {
        self.evict_expired().await;
        let id = job.id.clone();
        let handle = Arc::new(Mutex::new(job));
        self.jobs.write().await.insert(id.clone(), handle.clone());
        (id, handle)
    }

    fn execute<F>(&self, handle: JobHandle, work: F)
    where
        F: FnOnce(&StageLogger<'_>) -> Result<JobOutput, CoreError> + Send + 'static,
    {
        let workers = self.workers.clone();
        tokio::spawn(async move {
            let clock = handle.lock().await.clock;
            let (tx, rx) = mpsc::unbounded_channel();
            let drain = tokio::spawn(drain_events(handle.clone(), rx));
            let outcome = run_blocking(workers, clock, tx, work).await;
            if let Err(e) = drain.await {
                log::error!("stage drain task failed: {e}");
            }
            handle.lock().await.finish(outcome);
        });
    }

    /// Drop terminal jobs older than the TTL. Running jobs are never evicted.
    pub async fn evict_expired(&self) -> usize {
        let handles: Vec<(JobId, JobHandle)> = self
            .jobs
            .read()
            .await
            .iter()
            .map(|(id, h)| (id.clone(), h.clone()))
            .collect();
        let mut expired = Vec::new();
        for (id, handle) in handles {
            if handle.lock().await.expired(self.ttl) {
                expired.push(id);
            }
        }
        if expired.is_empty() {
            return 0;
        }
        let mut jobs = self.jobs.write().await;
        for id in &expired {
            jobs.remove(id);
        }
        log::info!("evicted {} expired jobs", expired.len());
        expired.len()
    }

    /// Periodic eviction until the registry is dropped.
    pub fn spawn_eviction(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.evict_expired().await;
            }
        })
    }
}

async fn drain_events(handle: JobHandle, mut rx: mpsc::UnboundedReceiver<StageEvent>) {
    while let Some(event) = rx.recv().await {
        handle.lock().await.stages.push(event);
    }
}

/// Run `work` on the blocking pool once a worker permit is free. `tx` is
/// dropped by the time this returns, which ends the drain.
async fn run_blocking<F>(
    workers: Arc<Semaphore>,
    clock: Instant,
    tx: mpsc::UnboundedSender<StageEvent>,
    work: F,
) -> Result<JobOutput, String>
where
    F: FnOnce(&StageLogger<'_>) -> Result<JobOutput, CoreError> + Send + 'static,
{
    let permit = workers
        .acquire_owned()
        .await
        .map_err(|_| "worker pool closed".to_string())?;
    let sink = ChannelSink(tx);
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        work(&StageLogger::starting_at(clock, &sink))
    });
    match task.await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => Err("pipeline panicked".to_string()),
        Err(e) => Err(format!("pipeline task failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairdraw_core::{ExternalSource, SourceCategory, SourceError, default_registry};

    fn registry(ttl: Duration) -> Arc<JobRegistry> {
        Arc::new(JobRegistry::new(default_registry(), 2, ttl))
    }

    #[test]
    fn test_channel_sink_forwards_and_ignores_closed_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink(tx);
        StageLogger::new(&sink).stage("x", Value::Null);
        assert_eq!(rx.try_recv().map(|e| e.stage).ok().as_deref(), Some("x"));
        drop(rx);
        StageLogger::new(&sink).stage("late", Value::Null);
    }

    async fn wait_terminal(handle: &JobHandle) -> JobStatus {
        for _ in 0..600 {
            let status = handle.lock().await.status;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("job did not finish");
    }

    fn small_draw() -> DrawConfig {
        DrawConfig {
            bits: 512,
            ..DrawConfig::default()
        }
    }

    #[tokio::test]
    async fn test_draw_completes_with_full_log() {
        let reg = registry(Duration::from_secs(60));
        let id = reg.start_draw(small_draw()).await.unwrap();
        let handle = reg.get(&id, JobKind::Draw).await.unwrap();
        assert_eq!(wait_terminal(&handle).await, JobStatus::Completed);

        let job = handle.lock().await;
        assert_eq!(job.stages.last().map(|e| e.stage.as_str()), Some("tests:done"));
        assert!(job.finished_at.is_some());
        assert_eq!(job.bits().unwrap().len(), 512);
        let result = serde_json::to_value(job.draw_result()).unwrap();
        assert_eq!(result["status"], "completed");
        assert_eq!(result["draw"].as_array().map(Vec::len), Some(6));
        assert_eq!(result["fingerprint"].as_str().map(str::len), Some(64));
    }

    #[tokio::test]
    async fn test_log_frozen_after_terminal() {
        let reg = registry(Duration::from_secs(60));
        let id = reg.start_draw(small_draw()).await.unwrap();
        let handle = reg.get(&id, JobKind::Draw).await.unwrap();
        wait_terminal(&handle).await;
        let before = handle.lock().await.stages.len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.lock().await.stages.len(), before);
    }

    #[tokio::test]
    async fn test_invalid_config_creates_no_job() {
        let reg = registry(Duration::from_secs(60));
        let cfg = DrawConfig {
            sources: vec!["horoscope".into()],
            ..DrawConfig::default()
        };
        let err = reg.start_draw(cfg).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_error_status() {
        let sources = SourceRegistry::new().with(ExternalSource::new(
            "news",
            SourceCategory::Feed,
            || Err(SourceError::Fetch("feed offline".into())),
        ));
        let reg = Arc::new(JobRegistry::new(sources, 1, Duration::from_secs(60)));
        let cfg = DrawConfig {
            sources: vec!["news".into()],
            bits: 256,
            ..DrawConfig::default()
        };
        let id = reg.start_draw(cfg).await.unwrap();
        let handle = reg.get(&id, JobKind::Draw).await.unwrap();
        assert_eq!(wait_terminal(&handle).await, JobStatus::Error);

        let job = handle.lock().await;
        assert_eq!(job.error.as_deref(), Some("no entropy source produced any data"));
        assert_eq!(job.bits().unwrap_err(), ServiceError::NotCompleted);
        let fin = job.final_payload();
        assert_eq!(fin["status"], "error");
        assert!(fin["error"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_kind_and_unknown_are_not_found() {
        let reg = registry(Duration::from_secs(60));
        let id = reg.start_draw(small_draw()).await.unwrap();
        assert_eq!(reg.get(&id, JobKind::Nist).await.unwrap_err(), ServiceError::NotFound);
        assert_eq!(
            reg.get("no-such-job", JobKind::Draw).await.unwrap_err(),
            ServiceError::NotFound
        );
    }

    #[tokio::test]
    async fn test_nist_job_over_draw_bits() {
        let reg = registry(Duration::from_secs(60));
        let draw_id = reg.start_draw(small_draw()).await.unwrap();
        let draw = reg.get(&draw_id, JobKind::Draw).await.unwrap();
        wait_terminal(&draw).await;

        let nist_id = reg.start_nist_for_draw(&draw_id).await.unwrap();
        let nist = reg.get(&nist_id, JobKind::Nist).await.unwrap();
        assert_eq!(wait_terminal(&nist).await, JobStatus::Completed);
        let job = nist.lock().await;
        assert_eq!(job.length, 512);
        let result = job.nist_result();
        assert_eq!(result.summary.total, 15);
        assert_eq!(result.tests.len(), result.summary.eligible);
    }

    #[tokio::test]
    async fn test_empty_nist_input_rejected() {
        let reg = registry(Duration::from_secs(60));
        let err = reg.start_nist(BitStream::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_eviction_removes_only_finished_jobs() {
        let reg = registry(Duration::ZERO);
        let id = reg.start_nist("0110".repeat(64).parse().unwrap()).await.unwrap();
        let handle = reg.get(&id, JobKind::Nist).await.unwrap();
        wait_terminal(&handle).await;
        assert_eq!(reg.evict_expired().await, 1);
        assert_eq!(reg.get(&id, JobKind::Nist).await.unwrap_err(), ServiceError::NotFound);
    }
}
