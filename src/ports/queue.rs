use crate::domain::jobs::PipelineJob;
use async_trait::async_trait;
use std::error::Error;

/// A job taken off the queue, together with the receipt needed to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: PipelineJob,
    /// Opaque handle identifying this message to the queue backend
    pub receipt: String,
}

#[async_trait]
pub trait JobQueuePort: Send + Sync {
    /// Enqueue a job
    async fn enqueue_job(&self, job: PipelineJob) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Dequeue a job (blocking with timeout or non-blocking)
    /// timeout_secs: 0.0 for infinite (or long poll), >0.0 for specific timeout
    ///
    /// The job stays in flight until acknowledged; an unacknowledged job is
    /// handed out again by `recover_in_flight`.
    async fn dequeue_job(
        &self,
        timeout_secs: f64,
    ) -> Result<Option<Delivery>, Box<dyn Error + Send + Sync>>;

    /// Drop a delivered job once its outcome is recorded
    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Put the jobs this consumer left in flight back on the queue
    /// Jobs held by other live consumers are not touched
    /// Returns the number of requeued jobs
    async fn recover_in_flight(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;
}
