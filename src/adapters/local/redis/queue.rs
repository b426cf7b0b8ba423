//! Redis JobQueuePort implementation.
//!
//! Jobs are pushed on the pending list and atomically moved to the consumer's
//! own processing list when a worker takes them. The raw payload is the
//! receipt: acknowledging removes exactly that payload from that list.
//!
//! Job secrets never enter the queue lists. They sit under their own key
//! with a TTL, are joined back on dequeue and deleted on acknowledge.

use super::error::RedisStoreError;
use super::pool::RedisPool;
use super::{processing_key, CREDENTIALS_TTL_SECS, JOB_CREDENTIALS_PREFIX, JOB_QUEUE_PENDING};
use crate::domain::jobs::{Credentials, PipelineJob};
use crate::ports::queue::{Delivery, JobQueuePort};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use tracing::{debug, warn};

#[async_trait]
impl JobQueuePort for RedisPool {
    async fn enqueue_job(
        &self,
        job: PipelineJob,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let (envelope, credentials) = detach_credentials(job);
        if !credentials.is_empty() {
            conn.set_ex::<_, _, ()>(
                credentials_key(&envelope.job_id),
                serde_json::to_string(&credentials)?,
                CREDENTIALS_TTL_SECS,
            )
            .await
            .map_err(RedisStoreError::from)?;
        }
        let json = serde_json::to_string(&envelope)?;
        conn.lpush::<_, _, ()>(JOB_QUEUE_PENDING, json)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(())
    }

    async fn dequeue_job(
        &self,
        timeout_secs: f64,
    ) -> Result<Option<Delivery>, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;

        let processing = processing_key(&self.consumer);
        let raw: Option<String> = conn
            .brpoplpush(JOB_QUEUE_PENDING, &processing, timeout_secs)
            .await
            .map_err(RedisStoreError::from)?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<PipelineJob>(&raw) {
            Ok(mut job) => {
                let secrets: Option<String> = conn
                    .get(credentials_key(&job.job_id))
                    .await
                    .map_err(RedisStoreError::from)?;
                match secrets {
                    Some(secrets) => job.credentials = serde_json::from_str(&secrets)?,
                    None => debug!(job_id = %job.job_id, "job queued without credentials"),
                }
                Ok(Some(Delivery { job, receipt: raw }))
            }
            Err(e) => {
                // Poison message: drop it so it is not redelivered forever
                warn!(error = %e, "discarding undecodable job payload");
                conn.lrem::<_, _, ()>(&processing, 1, &raw)
                    .await
                    .map_err(RedisStoreError::from)?;
                Err(Box::new(RedisStoreError::from(e)))
            }
        }
    }

    async fn acknowledge(
        &self,
        delivery: &Delivery,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        conn.lrem::<_, _, ()>(processing_key(&self.consumer), 1, &delivery.receipt)
            .await
            .map_err(RedisStoreError::from)?;
        conn.del::<_, ()>(credentials_key(&delivery.job.job_id))
            .await
            .map_err(RedisStoreError::from)?;
        Ok(())
    }

    async fn recover_in_flight(&self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let processing = processing_key(&self.consumer);
        let mut recovered = 0;
        loop {
            let moved: Option<String> = conn
                .rpoplpush(&processing, JOB_QUEUE_PENDING)
                .await
                .map_err(RedisStoreError::from)?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }
}

fn credentials_key(job_id: &str) -> String {
    format!("{}{}", JOB_CREDENTIALS_PREFIX, job_id)
}

/// Split the secrets off a job so the envelope can be queued without them.
fn detach_credentials(mut job: PipelineJob) -> (PipelineJob, Credentials) {
    let credentials = std::mem::take(&mut job.credentials);
    job.context.credentials = Credentials::new();
    (job, credentials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::{Collaborator, JobContext};
    use std::path::PathBuf;

    #[test]
    fn test_queued_envelope_carries_no_secrets() {
        let context = JobContext::new(
            "talk-1",
            PathBuf::from("talk-1.mp4"),
            Credentials::new()
                .with(Collaborator::Vision, "vision-secret")
                .with(Collaborator::Synthesis, "synthesis-secret"),
        );
        let (envelope, credentials) = detach_credentials(PipelineJob::new("job-1", context));

        let queued = serde_json::to_string(&envelope).unwrap();
        assert!(!queued.contains("vision-secret"));
        assert!(!queued.contains("synthesis-secret"));
        assert_eq!(credentials.get(Collaborator::Vision), Some("vision-secret"));
        assert_eq!(credentials.get(Collaborator::Synthesis), Some("synthesis-secret"));
        assert_eq!(credentials_key("job-1"), "cortex:job_credentials:job-1");
    }
}
