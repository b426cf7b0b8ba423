//! Redis JobStatusRepository implementation.
//!
//! The PENDING record and the terminal record live under different keys. The
//! terminal key is written with SET NX, so only the first completion sticks.

use super::error::RedisStoreError;
use super::pool::RedisPool;
use super::{JOB_RECORD_PREFIX, JOB_TERMINAL_PREFIX};
use crate::domain::jobs::JobRecord;
use crate::ports::repository::JobStatusRepository;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;

#[async_trait]
impl JobStatusRepository for RedisPool {
    async fn create_job(
        &self,
        record: &JobRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let key = format!("{}{}", JOB_RECORD_PREFIX, record.id);
        let json = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(&key, json)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(())
    }

    async fn get_job(
        &self,
        job_id: &str,
    ) -> Result<Option<JobRecord>, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let terminal_key = format!("{}{}", JOB_TERMINAL_PREFIX, job_id);
        let json: Option<String> = conn.get(&terminal_key).await.map_err(RedisStoreError::from)?;
        if let Some(data) = json {
            return Ok(Some(serde_json::from_str(&data)?));
        }

        let key = format!("{}{}", JOB_RECORD_PREFIX, job_id);
        let json: Option<String> = conn.get(&key).await.map_err(RedisStoreError::from)?;
        match json {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn complete_job(
        &self,
        record: &JobRecord,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        if !record.is_terminal() {
            return Err(format!("record for job {} is not terminal", record.id).into());
        }
        let mut conn = self.pool.get().await.map_err(RedisStoreError::from)?;
        let terminal_key = format!("{}{}", JOB_TERMINAL_PREFIX, record.id);
        let json = serde_json::to_string(record)?;
        let written: bool = conn
            .set_nx(&terminal_key, json)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(written)
    }
}
