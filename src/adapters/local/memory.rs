//! In-process queue and job records for single-process deployment and tests.
//!
//! Same contract as the Redis adapter: dequeued jobs stay in flight until
//! acknowledged, and the first terminal record written for a job wins.

use crate::domain::jobs::{JobRecord, PipelineJob};
use crate::ports::queue::{Delivery, JobQueuePort};
use crate::ports::repository::JobStatusRepository;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(String, PipelineJob)>,
    in_flight: HashMap<String, PipelineJob>,
}

/// In-memory job queue. Clones share the same queue.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<QueueState>>,
    available: Arc<Notify>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    async fn try_take(&self) -> Option<Delivery> {
        let mut state = self.state.lock().await;
        let (receipt, job) = state.pending.pop_front()?;
        state.in_flight.insert(receipt.clone(), job.clone());
        Some(Delivery { job, receipt })
    }
}

#[async_trait]
impl JobQueuePort for MemoryQueue {
    async fn enqueue_job(&self, job: PipelineJob) -> Result<(), Box<dyn Error + Send + Sync>> {
        let receipt = Uuid::new_v4().to_string();
        self.state.lock().await.pending.push_back((receipt, job));
        self.available.notify_one();
        Ok(())
    }

    async fn dequeue_job(
        &self,
        timeout_secs: f64,
    ) -> Result<Option<Delivery>, Box<dyn Error + Send + Sync>> {
        let wait = async {
            loop {
                let notified = self.available.notified();
                if let Some(delivery) = self.try_take().await {
                    return delivery;
                }
                notified.await;
            }
        };

        if timeout_secs > 0.0 {
            Ok(tokio::time::timeout(Duration::from_secs_f64(timeout_secs), wait)
                .await
                .ok())
        } else {
            Ok(Some(wait.await))
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.state.lock().await.in_flight.remove(&delivery.receipt);
        Ok(())
    }

    async fn recover_in_flight(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let mut state = self.state.lock().await;
        let recovered: Vec<_> = state.in_flight.drain().collect();
        let count = recovered.len();
        for entry in recovered {
            state.pending.push_back(entry);
        }
        drop(state);
        for _ in 0..count {
            self.available.notify_one();
        }
        Ok(count)
    }
}

/// In-memory job records. Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryJobRepository {
    records: Arc<Mutex<HashMap<String, JobRecord>>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, in no particular order.
    pub async fn all(&self) -> Vec<JobRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl JobStatusRepository for MemoryJobRepository {
    async fn create_job(&self, record: &JobRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.records
            .lock()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_job(
        &self,
        job_id: &str,
    ) -> Result<Option<JobRecord>, Box<dyn Error + Send + Sync>> {
        Ok(self.records.lock().await.get(job_id).cloned())
    }

    async fn complete_job(&self, record: &JobRecord) -> Result<bool, Box<dyn Error + Send + Sync>> {
        if !record.is_terminal() {
            return Err(format!("record for job {} is not terminal", record.id).into());
        }
        let mut records = self.records.lock().await;
        if records.get(&record.id).is_some_and(JobRecord::is_terminal) {
            return Ok(false);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(true)
    }
}
