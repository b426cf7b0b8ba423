//! Worker Binary - Analysis workers only, fed from the Redis queue
//!
//! Run any number of these next to a monolith (or another submitter) that
//! shares `REDIS_URL` and `ARTIFACT_DIR`.

use cortex::adapters::engines::local_engines;
use cortex::adapters::local::{FsAdapter, RedisPool};
use cortex::application::pipeline::Pipeline;
use cortex::application::worker::{spawn_workers, WorkerService};
use cortex::config::LocalConfig;
use cortex::ports::queue::JobQueuePort;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LocalConfig::from_env();

    let pool = match RedisPool::new(&config.redis_url, &config.consumer_name) {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to connect to Redis");
            std::process::exit(1);
        }
    };

    // Jobs left in flight by a previous run restart from the first stage
    match pool.recover_in_flight().await {
        Ok(count) => info!(count, consumer = pool.consumer(), "requeued in-flight jobs"),
        Err(e) => {
            error!(error = %e, "failed to recover in-flight jobs");
            std::process::exit(1);
        }
    }

    let storage = Arc::new(FsAdapter::new(&config.artifact_dir));
    let engines = local_engines(&config.engines);
    let pipeline = Arc::new(Pipeline::standard(&engines, storage, &config.pipeline));
    let worker = Arc::new(WorkerService::new(
        Arc::new(pool.clone()),
        Arc::new(pool),
        pipeline,
    ));

    for handle in spawn_workers(worker, config.workers) {
        if let Err(e) = handle.await {
            error!(error = %e, "worker task ended");
        }
    }
}
