//! Local adapters for monolith deployment.

pub mod events;
pub mod fs;
pub mod http;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use crate::config::{LocalConfig, QueueBackend};
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::JobStatusRepository;
use std::error::Error;
use std::sync::Arc;

pub use events::hub::EventHub;
pub use fs::FsAdapter;
pub use memory::{MemoryJobRepository, MemoryQueue};
#[cfg(feature = "redis")]
pub use redis::RedisPool;

/// Queue and job record store selected by `QUEUE_BACKEND`.
pub type Backends = (Arc<dyn JobQueuePort>, Arc<dyn JobStatusRepository>);

pub fn backends(config: &LocalConfig) -> Result<Backends, Box<dyn Error + Send + Sync>> {
    match config.queue_backend {
        QueueBackend::Memory => Ok((
            Arc::new(MemoryQueue::new()),
            Arc::new(MemoryJobRepository::new()),
        )),
        #[cfg(feature = "redis")]
        QueueBackend::Redis => {
            let pool = RedisPool::new(&config.redis_url, &config.consumer_name)?;
            Ok((Arc::new(pool.clone()), Arc::new(pool)))
        }
        #[cfg(not(feature = "redis"))]
        QueueBackend::Redis => Err("built without the redis feature".into()),
    }
}
