use crate::application::artifacts;
use crate::domain::errors::{EngineError, PipelineError};
use crate::domain::jobs::{Collaborator, JobContext};
use crate::domain::stage::{Stage, StageName, StageOutcome};
use crate::domain::timeline::MotionDescription;
use crate::ports::engines::{FrameSampler, VisionDescriber};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Short captions of frames sampled at a fixed interval.
///
/// Without a usable vision credential the stage writes an empty list and the
/// job carries on. Media that cannot be opened still aborts.
pub struct MotionStage {
    sampler: Arc<dyn FrameSampler>,
    describer: Arc<dyn VisionDescriber>,
    storage: Arc<dyn StoragePort>,
    interval: Duration,
}

enum Captions {
    Done(Vec<MotionDescription>),
    CredentialRejected(String),
}

impl MotionStage {
    pub fn new(
        sampler: Arc<dyn FrameSampler>,
        describer: Arc<dyn VisionDescriber>,
        storage: Arc<dyn StoragePort>,
        interval: Duration,
    ) -> Self {
        Self {
            sampler,
            describer,
            storage,
            interval,
        }
    }

    async fn degrade(&self, context: JobContext, reason: String) -> StageOutcome {
        warn!(processing_id = %context.processing_id, %reason, "visual descriptions skipped");
        let empty: Vec<MotionDescription> = Vec::new();
        match artifacts::store_json(self.storage.as_ref(), context, self.name(), &empty).await {
            Ok(context) => StageOutcome::degraded(context, reason),
            Err(e) => StageOutcome::Abort(e),
        }
    }

    async fn caption_frames(&self, context: &JobContext, api_key: &str) -> Result<Captions, PipelineError> {
        let frames = self
            .sampler
            .sample(&context.video_path, self.interval)
            .await
            .map_err(|e| PipelineError::stage_failed(self.name(), e))?;

        let mut descriptions = Vec::new();
        for frame in frames.frames() {
            let image = match tokio::fs::read(&frame.path).await {
                Ok(image) => image,
                Err(e) => {
                    warn!(timestamp = frame.timestamp, error = %e, "cannot read frame, skipping");
                    continue;
                }
            };
            match self.describer.describe(api_key, &image).await {
                Ok(text) if !text.trim().is_empty() => descriptions.push(MotionDescription {
                    timestamp: frame.timestamp,
                    text: text.trim().to_string(),
                }),
                Ok(_) => {}
                Err(EngineError::Credential(detail)) => {
                    return Ok(Captions::CredentialRejected(detail));
                }
                Err(e) => {
                    warn!(
                        processing_id = %context.processing_id,
                        timestamp = frame.timestamp,
                        error = %e,
                        "vision call failed on frame, skipping"
                    );
                }
            }
        }
        info!(
            processing_id = %context.processing_id,
            frames = frames.len(),
            descriptions = descriptions.len(),
            "motion description complete"
        );
        Ok(Captions::Done(descriptions))
    }
}

#[async_trait]
impl Stage for MotionStage {
    fn name(&self) -> StageName {
        StageName::Motion
    }

    async fn run(&self, context: JobContext) -> StageOutcome {
        let Some(api_key) = context.credentials.get(Collaborator::Vision).map(str::to_owned) else {
            return self
                .degrade(context, "no vision credential provided".to_string())
                .await;
        };

        if let Err(e) = self.describer.connect(&api_key).await {
            return self
                .degrade(context, format!("vision collaborator unavailable: {}", e))
                .await;
        }

        match self.caption_frames(&context, &api_key).await {
            Ok(Captions::Done(descriptions)) => {
                artifacts::store_json(self.storage.as_ref(), context, self.name(), &descriptions)
                    .await
                    .into()
            }
            Ok(Captions::CredentialRejected(detail)) => {
                self.degrade(context, format!("vision credential rejected: {}", detail))
                    .await
            }
            Err(e) => StageOutcome::Abort(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::fs::FsAdapter;
    use crate::domain::jobs::Credentials;
    use crate::ports::engines::{FrameSet, MockFrameSampler, MockVisionDescriber, SampledFrame};
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// Three real frame files, the second of which the describer fails on.
    fn frames_on_disk() -> (TempDir, Vec<SampledFrame>) {
        let dir = tempdir().unwrap();
        let frames = (0..3)
            .map(|k| {
                let path = dir.path().join(format!("frame_{}.jpg", k));
                std::fs::write(&path, [0xFF, 0xD8, k as u8]).unwrap();
                SampledFrame {
                    timestamp: k as f64 * 10.0,
                    path,
                }
            })
            .collect();
        (dir, frames)
    }

    fn sampler(frames: Vec<SampledFrame>) -> MockFrameSampler {
        let mut sampler = MockFrameSampler::new();
        sampler
            .expect_sample()
            .returning(move |_, _| Ok(FrameSet::borrowed(frames.clone())));
        sampler
    }

    fn stage(sampler: MockFrameSampler, describer: MockVisionDescriber, root: &Path) -> MotionStage {
        MotionStage::new(
            Arc::new(sampler),
            Arc::new(describer),
            Arc::new(FsAdapter::new(root)),
            Duration::from_secs(10),
        )
    }

    fn context(key: &str) -> JobContext {
        JobContext::new(
            "talk-1",
            "talk.mp4".into(),
            Credentials::new().with(Collaborator::Vision, key),
        )
    }

    fn written(ctx: &JobContext) -> Vec<MotionDescription> {
        let locator = ctx.artifact(StageName::Motion).unwrap();
        serde_json::from_slice(&std::fs::read(locator).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_credential_degrades_with_empty_artifact() {
        let store = tempdir().unwrap();
        let mut sampler = MockFrameSampler::new();
        sampler.expect_sample().never();

        match stage(sampler, MockVisionDescriber::new(), store.path())
            .run(context(""))
            .await
        {
            StageOutcome::DegradedContinue { context, reason } => {
                assert!(reason.contains("no vision credential"));
                assert!(written(&context).is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_degrades() {
        let store = tempdir().unwrap();
        let mut describer = MockVisionDescriber::new();
        describer
            .expect_connect()
            .returning(|_| Err(EngineError::Credential("401 Unauthorized".into())));

        match stage(MockFrameSampler::new(), describer, store.path())
            .run(context("bad-key"))
            .await
        {
            StageOutcome::DegradedContinue { context, .. } => assert!(written(&context).is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_frames_are_skipped() {
        let store = tempdir().unwrap();
        let (_frames_dir, frames) = frames_on_disk();
        let mut describer = MockVisionDescriber::new();
        describer.expect_connect().returning(|_| Ok(()));
        describer.expect_describe().returning(|_, image| {
            if image[2] == 1 {
                Err(EngineError::Request("503 Service Unavailable".into()))
            } else {
                Ok(format!("Slide number {}.\n", image[2]))
            }
        });

        match stage(sampler(frames), describer, store.path())
            .run(context("good-key"))
            .await
        {
            StageOutcome::Continue(ctx) => {
                let descriptions = written(&ctx);
                assert_eq!(descriptions.len(), 2);
                assert_eq!(descriptions[0].timestamp, 0.0);
                assert_eq!(descriptions[1].timestamp, 20.0);
                assert_eq!(descriptions[1].text, "Slide number 2.");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_credential_mid_stage_degrades() {
        let store = tempdir().unwrap();
        let (_frames_dir, frames) = frames_on_disk();
        let mut describer = MockVisionDescriber::new();
        describer.expect_connect().returning(|_| Ok(()));
        describer
            .expect_describe()
            .returning(|_, _| Err(EngineError::Credential("403 Forbidden".into())));

        match stage(sampler(frames), describer, store.path())
            .run(context("revoked-key"))
            .await
        {
            StageOutcome::DegradedContinue { context, reason } => {
                assert!(reason.contains("rejected"));
                assert!(written(&context).is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_media_aborts() {
        let store = tempdir().unwrap();
        let mut sampler = MockFrameSampler::new();
        sampler
            .expect_sample()
            .returning(|_, _| Err(EngineError::Media("invalid data".into())));
        let mut describer = MockVisionDescriber::new();
        describer.expect_connect().returning(|_| Ok(()));

        match stage(sampler, describer, store.path())
            .run(context("good-key"))
            .await
        {
            StageOutcome::Abort(err) => assert_eq!(err.stage(), Some(StageName::Motion)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
