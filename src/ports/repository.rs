use crate::domain::jobs::JobRecord;
use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait JobStatusRepository: Send + Sync {
    /// Store the PENDING record of a freshly submitted job
    async fn create_job(&self, record: &JobRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Get the current record (terminal if one was written)
    async fn get_job(&self, job_id: &str)
        -> Result<Option<JobRecord>, Box<dyn Error + Send + Sync>>;

    /// Write the terminal record
    /// Returns false if the job was already terminal; the stored record is left untouched
    async fn complete_job(&self, record: &JobRecord) -> Result<bool, Box<dyn Error + Send + Sync>>;
}
