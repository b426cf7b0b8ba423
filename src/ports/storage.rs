use async_trait::async_trait;
use std::error::Error;

#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Write an artifact under `key`, replacing any previous content
    /// Returns the locator to record in the job context
    async fn write(&self, key: &str, data: &[u8]) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Read an artifact back by the locator `write` returned
    async fn read(&self, locator: &str) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;
}

/// Storage key of a job artifact: deterministic in processing id and stage.
pub fn artifact_key(processing_id: &str, name: &str, extension: &str) -> String {
    format!("{}/{}.{}", processing_id, name, extension)
}
