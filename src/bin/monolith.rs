//! Monolith Binary - Job API and analysis workers in one process
//!
//! This is the main entry point for local development and single-server deployment.
//! It wires up:
//! - Queue and job records (Redis or in-memory, per `QUEUE_BACKEND`)
//! - Filesystem artifact store
//! - Analysis workers running the five-stage chain
//! - HTTP job API with push notification of terminal records

use cortex::adapters::engines::local_engines;
use cortex::adapters::local::http::{router, AppState};
use cortex::adapters::local::{backends, EventHub, FsAdapter};
use cortex::application::orchestrator::OrchestratorService;
use cortex::application::pipeline::Pipeline;
use cortex::application::worker::{spawn_workers, WorkerService};
use cortex::config::LocalConfig;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LocalConfig::from_env();

    // 1. Adapters
    let (queue, repo) = match backends(&config) {
        Ok(backends) => backends,
        Err(e) => {
            error!(error = %e, "failed to set up the job queue");
            std::process::exit(1);
        }
    };
    let storage = Arc::new(FsAdapter::new(&config.artifact_dir));
    let engines = local_engines(&config.engines);
    let events = Arc::new(EventHub::new());

    match queue.recover_in_flight().await {
        Ok(0) => {}
        Ok(count) => info!(count, "requeued interrupted jobs"),
        Err(e) => warn!(error = %e, "could not recover in-flight jobs"),
    }

    // 2. Application services
    let pipeline = Arc::new(Pipeline::standard(&engines, storage.clone(), &config.pipeline));
    let worker = Arc::new(
        WorkerService::new(queue.clone(), repo.clone(), pipeline).with_events(events.clone()),
    );
    let orchestrator = Arc::new(OrchestratorService::new(
        storage,
        queue,
        repo,
        engines.probe.clone(),
        &config.upload_dir,
    ));

    // 3. Workers
    spawn_workers(worker, config.workers);

    // 4. HTTP layer
    let app = router(AppState::new(orchestrator, events));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .expect("Failed to bind TCP listener");
    info!(address = %config.bind_address(), "listening");
    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
