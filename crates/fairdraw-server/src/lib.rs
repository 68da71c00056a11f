//! HTTP job service for verifiable draws and NIST SP 800-22 audits.
//!
//! Draws and NIST runs are background jobs. Clients start one, then follow
//! its stage log through `/…/events/{id}` (pull) or `/…/stream/{id}` (SSE)
//! and fetch the result when it is terminal.

use fairdraw_core::SourceRegistry;

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod stream;

pub use config::{ConfigError, ServerConfig, auto_workers};
pub use error::ServiceError;
pub use jobs::{Job, JobHandle, JobId, JobKind, JobRegistry, JobStatus};
pub use routes::{AppState, build_router};
pub use stream::{ProgressBatch, ProgressReader};

/// Run the HTTP server until it fails.
pub async fn run_server(config: ServerConfig, sources: SourceRegistry) -> std::io::Result<()> {
    let state = AppState::new(&config, sources);
    let eviction = state.jobs.spawn_eviction(config.eviction_interval);
    let app = build_router(state);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!(
        "fairdraw listening on {addr} ({} workers, job ttl {}s)",
        config.workers,
        config.job_ttl.as_secs()
    );
    let served = axum::serve(listener, app).await;
    eviction.abort();
    served
}
