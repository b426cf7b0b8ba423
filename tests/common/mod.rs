//! Deterministic stand-ins for the external engines.

#![allow(dead_code)]

use async_trait::async_trait;
use cortex::adapters::local::{FsAdapter, MemoryJobRepository, MemoryQueue};
use cortex::application::orchestrator::{OrchestratorService, StagedUpload};
use cortex::application::pipeline::Pipeline;
use cortex::application::speech::SpeechModel;
use cortex::application::stages::Engines;
use cortex::application::worker::WorkerService;
use cortex::config::PipelineSettings;
use cortex::domain::errors::EngineError;
use cortex::domain::timeline::{FusedChunk, TranscriptSegment};
use cortex::ports::engines::{
    DocumentSynthesizer, FrameSampler, FrameSet, MediaInfo, MediaProbe, RecognizedText,
    SampledFrame, SpeechToText, TextRecognizer, VisionDescriber,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const DURATION: f64 = 12.0;

pub struct FakeProbe;

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn probe(&self, _path: &Path) -> Result<MediaInfo, EngineError> {
        Ok(MediaInfo {
            duration: DURATION,
            has_video: true,
            has_audio: true,
        })
    }
}

/// Writes one small file per sampling instant; its bytes are the timestamp.
pub struct FakeSampler;

#[async_trait]
impl FrameSampler for FakeSampler {
    async fn sample(&self, _path: &Path, interval: Duration) -> Result<FrameSet, EngineError> {
        let dir = tempfile::tempdir()?;
        let step = interval.as_secs_f64();
        let mut frames = Vec::new();
        let mut k = 0;
        while (k as f64) * step < DURATION {
            let timestamp = k as f64 * step;
            let path = dir.path().join(format!("frame_{:05}.jpg", k));
            std::fs::write(&path, format!("{}", timestamp))?;
            frames.push(SampledFrame { timestamp, path });
            k += 1;
        }
        Ok(FrameSet::new(frames, dir))
    }
}

pub struct FakeSpeech;

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn transcribe(&self, _media: &Path) -> Result<Vec<TranscriptSegment>, EngineError> {
        Ok(vec![
            TranscriptSegment {
                start: 0.0,
                end: 4.0,
                text: "Welcome to the keynote.".into(),
            },
            TranscriptSegment {
                start: 4.0,
                end: 9.0,
                text: "Let us look at the roadmap.".into(),
            },
        ])
    }
}

pub struct FakeOcr;

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn recognize(&self, _image: &Path) -> Result<Vec<RecognizedText>, EngineError> {
        Ok(vec![
            RecognizedText {
                text: "ROADMAP".into(),
                confidence: 91.0,
            },
            RecognizedText {
                text: "smudge".into(),
                confidence: 12.0,
            },
        ])
    }
}

pub struct FakeVision;

#[async_trait]
impl VisionDescriber for FakeVision {
    async fn connect(&self, _api_key: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn describe(&self, _api_key: &str, image: &[u8]) -> Result<String, EngineError> {
        Ok(format!("A slide shown at {}s.", String::from_utf8_lossy(image)))
    }
}

pub struct FakeSynthesizer {
    pub fail: bool,
}

#[async_trait]
impl DocumentSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _api_key: &str, timeline: &[FusedChunk]) -> Result<String, EngineError> {
        if self.fail {
            return Err(EngineError::Request("503 Service Unavailable".into()));
        }
        Ok(format!("# Keynote\n\n{} chunks analysed.", timeline.len()))
    }
}

pub fn engines(synthesis_fails: bool) -> Engines {
    Engines {
        probe: Arc::new(FakeProbe),
        sampler: Arc::new(FakeSampler),
        speech: Arc::new(SpeechModel::ready(Arc::new(FakeSpeech))),
        recognizer: Arc::new(FakeOcr),
        describer: Arc::new(FakeVision),
        synthesizer: Arc::new(FakeSynthesizer {
            fail: synthesis_fails,
        }),
    }
}

/// Everything a single-process deployment wires together, on temp dirs.
pub struct Harness {
    pub dir: TempDir,
    pub queue: MemoryQueue,
    pub repo: MemoryJobRepository,
    pub storage: FsAdapter,
    pub orchestrator: Arc<OrchestratorService>,
    pub worker: Arc<WorkerService>,
}

impl Harness {
    pub fn new(synthesis_fails: bool, settings: PipelineSettings) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let queue = MemoryQueue::new();
        let repo = MemoryJobRepository::new();
        let storage = FsAdapter::new(dir.path().join("artifacts"));
        let engines = engines(synthesis_fails);

        let pipeline = Pipeline::standard(&engines, Arc::new(storage.clone()), &settings);
        let worker = Arc::new(WorkerService::new(
            Arc::new(queue.clone()),
            Arc::new(repo.clone()),
            Arc::new(pipeline),
        ));
        let orchestrator = Arc::new(OrchestratorService::new(
            Arc::new(storage.clone()),
            Arc::new(queue.clone()),
            Arc::new(repo.clone()),
            engines.probe.clone(),
            dir.path().join("uploads"),
        ));

        Self {
            dir,
            queue,
            repo,
            storage,
            orchestrator,
            worker,
        }
    }

    /// Stage a fake upload the way the HTTP layer would.
    pub async fn staged(&self, name: &str, content_type: &str) -> StagedUpload {
        let path = self.orchestrator.staging_path();
        tokio::fs::create_dir_all(path.parent().expect("staging dir"))
            .await
            .expect("create staging dir");
        tokio::fs::write(&path, b"\x00\x00\x00\x18ftypmp42")
            .await
            .expect("write upload");
        StagedUpload {
            path,
            file_name: name.to_string(),
            content_type: Some(content_type.to_string()),
        }
    }
}
