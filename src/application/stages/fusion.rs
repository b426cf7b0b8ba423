use crate::application::artifacts;
use crate::domain::errors::PipelineError;
use crate::domain::fusion::fuse;
use crate::domain::jobs::JobContext;
use crate::domain::stage::{Stage, StageName, StageOutcome};
use crate::domain::timeline::{FusedChunk, MotionDescription, OcrDetection, TranscriptSegment};
use crate::ports::engines::MediaProbe;
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Aligns the three analysis artifacts on a fixed-step timeline.
pub struct FusionStage {
    probe: Arc<dyn MediaProbe>,
    storage: Arc<dyn StoragePort>,
    step: f64,
}

impl FusionStage {
    pub fn new(probe: Arc<dyn MediaProbe>, storage: Arc<dyn StoragePort>, step: f64) -> Self {
        Self {
            probe,
            storage,
            step,
        }
    }

    async fn fused(&self, context: &JobContext) -> Result<Vec<FusedChunk>, PipelineError> {
        let storage = self.storage.as_ref();
        let spoken: Vec<TranscriptSegment> =
            artifacts::load_json(storage, context, self.name(), StageName::Transcription).await?;
        let on_screen: Vec<OcrDetection> =
            artifacts::load_json(storage, context, self.name(), StageName::StaticText).await?;
        let visuals: Vec<MotionDescription> =
            artifacts::load_json(storage, context, self.name(), StageName::Motion).await?;

        let media = self
            .probe
            .probe(&context.video_path)
            .await
            .map_err(|e| PipelineError::stage_failed(self.name(), e))?;

        let buckets = fuse(&spoken, &on_screen, &visuals, media.duration, self.step)
            .map_err(|e| PipelineError::stage_failed(self.name(), e))?;

        info!(
            processing_id = %context.processing_id,
            duration = media.duration,
            buckets = buckets.len(),
            "fusion complete"
        );
        Ok(buckets.iter().map(FusedChunk::from).collect())
    }
}

#[async_trait]
impl Stage for FusionStage {
    fn name(&self) -> StageName {
        StageName::Fusion
    }

    async fn run(&self, context: JobContext) -> StageOutcome {
        match self.fused(&context).await {
            Ok(timeline) => {
                artifacts::store_json(self.storage.as_ref(), context, self.name(), &timeline)
                    .await
                    .into()
            }
            Err(e) => StageOutcome::Abort(e),
        }
    }
}
