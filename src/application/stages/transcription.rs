use crate::application::artifacts;
use crate::application::speech::SpeechModel;
use crate::domain::errors::PipelineError;
use crate::domain::jobs::JobContext;
use crate::domain::stage::{Stage, StageName, StageOutcome};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Speech to text over the whole media file. Any engine failure aborts.
pub struct TranscriptionStage {
    speech: Arc<SpeechModel>,
    storage: Arc<dyn StoragePort>,
}

impl TranscriptionStage {
    pub fn new(speech: Arc<SpeechModel>, storage: Arc<dyn StoragePort>) -> Self {
        Self { speech, storage }
    }
}

#[async_trait]
impl Stage for TranscriptionStage {
    fn name(&self) -> StageName {
        StageName::Transcription
    }

    async fn run(&self, context: JobContext) -> StageOutcome {
        let segments = match self.speech.transcribe(&context.video_path).await {
            Ok(segments) => segments,
            Err(e) => return StageOutcome::Abort(PipelineError::stage_failed(self.name(), e)),
        };

        info!(
            processing_id = %context.processing_id,
            segments = segments.len(),
            "transcription complete"
        );
        artifacts::store_json(self.storage.as_ref(), context, self.name(), &segments)
            .await
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::fs::FsAdapter;
    use crate::domain::errors::EngineError;
    use crate::domain::jobs::Credentials;
    use crate::domain::timeline::TranscriptSegment;
    use crate::ports::engines::MockSpeechToText;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn context() -> JobContext {
        JobContext::new("talk-1", PathBuf::from("talk.mp4"), Credentials::new())
    }

    #[tokio::test]
    async fn test_writes_segments() {
        let dir = tempdir().unwrap();
        let mut speech = MockSpeechToText::new();
        speech.expect_transcribe().returning(|_| {
            Ok(vec![TranscriptSegment {
                start: 0.0,
                end: 2.5,
                text: "Welcome".into(),
            }])
        });
        let stage = TranscriptionStage::new(
            Arc::new(SpeechModel::ready(Arc::new(speech))),
            Arc::new(FsAdapter::new(dir.path())),
        );

        match stage.run(context()).await {
            StageOutcome::Continue(ctx) => {
                let locator = ctx.artifact(StageName::Transcription).unwrap();
                let written = std::fs::read_to_string(locator).unwrap();
                assert!(written.contains("Welcome"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_engine_failure_aborts() {
        let dir = tempdir().unwrap();
        let mut speech = MockSpeechToText::new();
        speech
            .expect_transcribe()
            .returning(|_| Err(EngineError::Media("moov atom not found".into())));
        let stage = TranscriptionStage::new(
            Arc::new(SpeechModel::ready(Arc::new(speech))),
            Arc::new(FsAdapter::new(dir.path())),
        );

        match stage.run(context()).await {
            StageOutcome::Abort(err) => assert_eq!(err.stage(), Some(StageName::Transcription)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
