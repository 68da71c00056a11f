//! HTTP handlers.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::Bytes,
    extract::{Path, Query, State},
    response::{
        IntoResponse, Json, Response,
        sse::{KeepAlive, Sse},
    },
    routing::{get, post},
};
use fairdraw_core::{AuditInput, AuditReport, AuditRequest, DrawConfig, SourceRegistry, analyze};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::jobs::{JobId, JobKind, JobRegistry};
use crate::stream::{ProgressBatch, ProgressReader, sse_events};

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobRegistry>,
    pub stream_poll: Duration,
}

impl AppState {
    pub fn new(config: &ServerConfig, sources: SourceRegistry) -> Self {
        Self {
            jobs: Arc::new(JobRegistry::new(sources, config.workers, config.job_ttl)),
            stream_poll: config.stream_poll,
        }
    }
}

#[derive(Deserialize)]
struct CursorParams {
    #[serde(default)]
    cursor: usize,
}

fn started(job_id: JobId) -> Json<Value> {
    Json(json!({"job_id": job_id}))
}

async fn handle_index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "Fairdraw",
        "version": fairdraw_core::VERSION,
        "sources": state.jobs.sources().names(),
        "endpoints": [
            "/draw/start",
            "/draw/result/{job_id}",
            "/draw/stream/{job_id}",
            "/draw/events/{job_id}",
            "/draw/bits/{job_id}",
            "/draw/{job_id}/nist/start",
            "/audit/analyze",
            "/audit/upload",
            "/audit/nist/start",
            "/audit/nist/result/{job_id}",
            "/audit/nist/stream/{job_id}",
            "/audit/nist/events/{job_id}",
            "/health",
        ],
    }))
}

async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64());
    Json(json!({
        "status": "ok",
        "time": time,
        "jobs": state.jobs.len().await,
        "active_jobs": state.jobs.active().await,
    }))
}

// ── Draw ────────────────────────────────────────────────────────────────────

async fn handle_draw_start(
    State(state): State<AppState>,
    Json(config): Json<DrawConfig>,
) -> Result<Json<Value>, ServiceError> {
    state.jobs.start_draw(config).await.map(started)
}

async fn handle_draw_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ServiceError> {
    let handle = state.jobs.get(&job_id, JobKind::Draw).await?;
    let job = handle.lock().await;
    Ok(Json(job.draw_result()).into_response())
}

async fn handle_draw_bits(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let handle = state.jobs.get(&job_id, JobKind::Draw).await?;
    let job = handle.lock().await;
    let bits = job.bits()?;
    Ok(Json(json!({
        "job_id": job.id,
        "bits": bits,
        "length": bits.len(),
    })))
}

async fn handle_draw_nist_start(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    state.jobs.start_nist_for_draw(&job_id).await.map(started)
}

// ── Audit ───────────────────────────────────────────────────────────────────

async fn handle_audit_analyze(
    Json(request): Json<AuditRequest>,
) -> Result<Json<AuditReport>, ServiceError> {
    let input = AuditInput::try_from(request)?;
    Ok(Json(analyze(&input)?))
}

/// Raw upload: every byte that is not `'0'` or `'1'` is ignored.
async fn handle_audit_upload(body: Bytes) -> Result<Json<AuditReport>, ServiceError> {
    let text = String::from_utf8_lossy(&body).into_owned();
    Ok(Json(analyze(&AuditInput::Bits(text))?))
}

async fn handle_audit_nist_start(
    State(state): State<AppState>,
    Json(request): Json<AuditRequest>,
) -> Result<Json<Value>, ServiceError> {
    let bits = AuditInput::try_from(request)?.to_bits()?;
    state.jobs.start_nist(bits).await.map(started)
}

async fn handle_nist_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ServiceError> {
    let handle = state.jobs.get(&job_id, JobKind::Nist).await?;
    let job = handle.lock().await;
    Ok(Json(job.nist_result()).into_response())
}

// ── Progress ────────────────────────────────────────────────────────────────

async fn events(
    state: &AppState,
    job_id: &str,
    kind: JobKind,
    cursor: usize,
) -> Result<Json<ProgressBatch>, ServiceError> {
    let handle = state.jobs.get(job_id, kind).await?;
    Ok(Json(ProgressReader::new(handle, cursor).read().await))
}

async fn stream(state: &AppState, job_id: &str, kind: JobKind) -> Result<Response, ServiceError> {
    let handle = state.jobs.get(job_id, kind).await?;
    let stream = sse_events(ProgressReader::new(handle, 0), state.stream_poll);
    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

async fn handle_draw_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<CursorParams>,
) -> Result<Json<ProgressBatch>, ServiceError> {
    events(&state, &job_id, JobKind::Draw, params.cursor).await
}

async fn handle_nist_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(params): Query<CursorParams>,
) -> Result<Json<ProgressBatch>, ServiceError> {
    events(&state, &job_id, JobKind::Nist, params.cursor).await
}

async fn handle_draw_stream(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ServiceError> {
    stream(&state, &job_id, JobKind::Draw).await
}

async fn handle_nist_stream(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ServiceError> {
    stream(&state, &job_id, JobKind::Nist).await
}

/// Build the axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/draw/start", post(handle_draw_start))
        .route("/draw/result/{job_id}", get(handle_draw_result))
        .route("/draw/stream/{job_id}", get(handle_draw_stream))
        .route("/draw/events/{job_id}", get(handle_draw_events))
        .route("/draw/bits/{job_id}", get(handle_draw_bits))
        .route("/draw/{job_id}/nist/start", post(handle_draw_nist_start))
        .route("/audit/analyze", post(handle_audit_analyze))
        .route("/audit/upload", post(handle_audit_upload))
        .route("/audit/nist/start", post(handle_audit_nist_start))
        .route("/audit/nist/result/{job_id}", get(handle_nist_result))
        .route("/audit/nist/stream/{job_id}", get(handle_nist_stream))
        .route("/audit/nist/events/{job_id}", get(handle_nist_events))
        .with_state(state)
}
