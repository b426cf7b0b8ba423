use super::pipeline::Pipeline;
use crate::domain::jobs::{JobFailure, JobRecord};
use crate::ports::events::JobEventPublisher;
use crate::ports::queue::{Delivery, JobQueuePort};
use crate::ports::repository::JobStatusRepository;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long a worker blocks on an empty queue before looping.
const DEQUEUE_TIMEOUT_SECS: f64 = 5.0;

pub struct WorkerService {
    queue: Arc<dyn JobQueuePort>,
    repo: Arc<dyn JobStatusRepository>,
    pipeline: Arc<Pipeline>,
    events: Option<Arc<dyn JobEventPublisher>>,
}

impl WorkerService {
    pub fn new(
        queue: Arc<dyn JobQueuePort>,
        repo: Arc<dyn JobStatusRepository>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            queue,
            repo,
            pipeline,
            events: None,
        }
    }

    /// Also announce terminal records on `events`.
    pub fn with_events(mut self, events: Arc<dyn JobEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn run_worker_loop(&self, worker_id: usize) {
        info!(worker = worker_id, "worker started");
        loop {
            if let Err(e) = self.process_next(worker_id, DEQUEUE_TIMEOUT_SECS).await {
                error!(worker = worker_id, error = %e, "queue error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    /// Take one job off the queue and run it to a terminal record.
    /// Returns false if the queue stayed empty for `timeout_secs`.
    pub async fn process_next(
        &self,
        worker_id: usize,
        timeout_secs: f64,
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        match self.queue.dequeue_job(timeout_secs).await? {
            Some(delivery) => {
                self.process_job(&delivery, worker_id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run the whole chain for one delivery.
    ///
    /// The delivery is acknowledged only after the terminal record is
    /// stored, so a crash in between replays the chain from stage one. A
    /// redelivered job that is already terminal is acknowledged untouched.
    pub async fn process_job(
        &self,
        delivery: &Delivery,
        worker_id: usize,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let job_id = delivery.job.job_id.clone();
        let processing_id = delivery.job.context.processing_id.clone();

        let record = match self.repo.get_job(&job_id).await? {
            Some(record) if record.is_terminal() => {
                info!(worker = worker_id, %job_id, "job already terminal, dropping redelivery");
                return self.queue.acknowledge(delivery).await;
            }
            Some(record) => record,
            None => {
                warn!(worker = worker_id, %job_id, "no record for delivered job, recreating");
                let record = JobRecord::pending(job_id.clone(), processing_id.clone());
                self.repo.create_job(&record).await?;
                record
            }
        };

        info!(worker = worker_id, %job_id, %processing_id, "processing job");
        let terminal = match self.pipeline.run(delivery.job.clone().into_context()).await {
            Ok(run) => {
                info!(
                    worker = worker_id,
                    %job_id,
                    warnings = run.warnings.len(),
                    "job succeeded"
                );
                record.succeeded(run.context, run.warnings)
            }
            Err(e) => {
                warn!(worker = worker_id, %job_id, error = %e, "job failed");
                record.failed(JobFailure::from(&e))
            }
        };

        if self.repo.complete_job(&terminal).await? {
            if let Some(events) = &self.events {
                events.publish_terminal(&terminal);
            }
        } else {
            info!(worker = worker_id, %job_id, "terminal record already written, keeping it");
        }

        self.queue.acknowledge(delivery).await
    }
}

/// Spawn `count` worker loops sharing one service.
pub fn spawn_workers(service: Arc<WorkerService>, count: usize) -> Vec<JoinHandle<()>> {
    let handles = (0..count)
        .map(|worker_id| {
            let service = service.clone();
            tokio::spawn(async move { service.run_worker_loop(worker_id).await })
        })
        .collect();
    info!(count, "started analysis workers");
    handles
}
