//! Redis connection pool.

use super::error::RedisStoreError;
use deadpool_redis::{Config, Pool, Runtime};

/// Redis-backed adapter for queue and repository operations.
///
/// `consumer` names this process on the queue: jobs it takes are parked on
/// its own in-flight list, so recovery never touches a live peer's jobs.
#[derive(Clone)]
pub struct RedisPool {
    pub(super) pool: Pool,
    pub(super) consumer: String,
}

impl RedisPool {
    /// Create a new RedisPool with connection pool.
    pub fn new(redis_url: &str, consumer: impl Into<String>) -> Result<Self, RedisStoreError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self {
            pool,
            consumer: consumer.into(),
        })
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }
}
