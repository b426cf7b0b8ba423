use crate::application::artifacts;
use crate::domain::errors::{EngineError, PipelineError};
use crate::domain::jobs::JobContext;
use crate::domain::stage::{Stage, StageName, StageOutcome};
use crate::domain::timeline::OcrDetection;
use crate::ports::engines::{FrameSampler, TextRecognizer};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// On-screen text, read from frames sampled at a fixed interval.
pub struct StaticTextStage {
    sampler: Arc<dyn FrameSampler>,
    recognizer: Arc<dyn TextRecognizer>,
    storage: Arc<dyn StoragePort>,
    interval: Duration,
    min_confidence: f64,
}

impl StaticTextStage {
    pub fn new(
        sampler: Arc<dyn FrameSampler>,
        recognizer: Arc<dyn TextRecognizer>,
        storage: Arc<dyn StoragePort>,
        interval: Duration,
        min_confidence: f64,
    ) -> Self {
        Self {
            sampler,
            recognizer,
            storage,
            interval,
            min_confidence,
        }
    }
}

#[async_trait]
impl Stage for StaticTextStage {
    fn name(&self) -> StageName {
        StageName::StaticText
    }

    async fn run(&self, context: JobContext) -> StageOutcome {
        let frames = match self.sampler.sample(&context.video_path, self.interval).await {
            Ok(frames) => frames,
            Err(e) => return StageOutcome::Abort(PipelineError::stage_failed(self.name(), e)),
        };

        let mut detections = Vec::new();
        for frame in frames.frames() {
            match self.recognizer.recognize(&frame.path).await {
                Ok(words) => detections.extend(
                    words
                        .into_iter()
                        .filter(|w| w.confidence > self.min_confidence)
                        .filter(|w| !w.text.trim().is_empty())
                        .map(|w| OcrDetection {
                            timestamp: frame.timestamp,
                            text: w.text.trim().to_string(),
                            confidence: w.confidence,
                        }),
                ),
                Err(e @ EngineError::Unavailable(_)) => {
                    return StageOutcome::Abort(PipelineError::stage_failed(self.name(), e))
                }
                Err(e) => {
                    warn!(
                        processing_id = %context.processing_id,
                        timestamp = frame.timestamp,
                        error = %e,
                        "OCR failed on frame, skipping"
                    );
                }
            }
        }

        info!(
            processing_id = %context.processing_id,
            frames = frames.len(),
            detections = detections.len(),
            "static text extraction complete"
        );
        artifacts::store_json(self.storage.as_ref(), context, self.name(), &detections)
            .await
            .into()
    }
}
