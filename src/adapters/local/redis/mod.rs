//! Redis adapter for local deployment.
//!
//! This module provides Redis-backed implementations of:
//! - `JobQueuePort` for job enqueueing/dequeueing with acknowledgement
//! - `JobStatusRepository` for job record tracking

mod error;
mod pool;
mod queue;
mod repository;

pub use error::RedisStoreError;
pub use pool::RedisPool;

/// Redis key constants
const JOB_QUEUE_PENDING: &str = "cortex:jobs:pending";
const JOB_QUEUE_PROCESSING_PREFIX: &str = "cortex:jobs:processing:";
const JOB_RECORD_PREFIX: &str = "cortex:job:";
const JOB_TERMINAL_PREFIX: &str = "cortex:job_terminal:";
const JOB_CREDENTIALS_PREFIX: &str = "cortex:job_credentials:";
/// Secrets of a queued job expire after a day even if it is never acknowledged
const CREDENTIALS_TTL_SECS: u64 = 24 * 60 * 60;

/// In-flight list owned by one consumer. Only that consumer recovers it.
fn processing_key(consumer: &str) -> String {
    format!("{}{}", JOB_QUEUE_PROCESSING_PREFIX, consumer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_list_is_per_consumer() {
        assert_eq!(processing_key("worker-a"), "cortex:jobs:processing:worker-a");
        assert_ne!(processing_key("worker-a"), processing_key("worker-b"));
        assert!(!processing_key("worker-a").starts_with(JOB_QUEUE_PENDING));
    }
}
