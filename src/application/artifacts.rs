//! Reading and writing stage artifacts through the storage port.

use crate::domain::errors::PipelineError;
use crate::domain::jobs::JobContext;
use crate::domain::stage::StageName;
use crate::ports::storage::{artifact_key, StoragePort};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Write `data` as the artifact of `stage` and record its locator.
///
/// The key depends only on the processing id and the stage, so a re-run
/// overwrites the previous artifact.
pub async fn store(
    storage: &dyn StoragePort,
    context: JobContext,
    stage: StageName,
    data: &[u8],
) -> Result<JobContext, PipelineError> {
    let key = artifact_key(
        &context.processing_id,
        stage.artifact_key(),
        stage.artifact_extension(),
    );
    let locator = storage
        .write(&key, data)
        .await
        .map_err(|e| PipelineError::Storage(format!("writing {}: {}", key, e)))?;
    context.with_artifact(stage, locator)
}

pub async fn store_json<T: Serialize + ?Sized>(
    storage: &dyn StoragePort,
    context: JobContext,
    stage: StageName,
    value: &T,
) -> Result<JobContext, PipelineError> {
    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| PipelineError::stage_failed(stage, format!("serializing artifact: {}", e)))?;
    store(storage, context, stage, &data).await
}

/// Load the JSON artifact `source` produced, on behalf of stage `reader`.
pub async fn load_json<T: DeserializeOwned>(
    storage: &dyn StoragePort,
    context: &JobContext,
    reader: StageName,
    source: StageName,
) -> Result<T, PipelineError> {
    let missing = |detail: String| PipelineError::MissingArtifact {
        stage: reader,
        key: source.artifact_key().to_string(),
        detail,
    };

    let locator = context
        .artifact(source)
        .ok_or_else(|| missing("not present in the job context".to_string()))?;
    let data = storage
        .read(locator)
        .await
        .map_err(|e| missing(e.to_string()))?;
    serde_json::from_slice(&data).map_err(|e| missing(e.to_string()))
}
