//! External collaborators invoked by the stages.
//!
//! Each trait is a contract only; the concrete engines live in
//! `adapters::engines`. Per-frame failures are reported as
//! [`EngineError::Frame`] so the stage can decide to skip them.

use crate::domain::errors::EngineError;
use crate::domain::timeline::{FusedChunk, TranscriptSegment};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// What a probe learned about a media file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
}

/// A still image taken from the video at `timestamp` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    pub timestamp: f64,
    pub path: PathBuf,
}

/// Frames sampled from one video. Owns the scratch directory they live in,
/// which is removed when the set is dropped.
#[derive(Debug)]
pub struct FrameSet {
    frames: Vec<SampledFrame>,
    _dir: Option<TempDir>,
}

impl FrameSet {
    pub fn new(frames: Vec<SampledFrame>, dir: TempDir) -> Self {
        Self {
            frames,
            _dir: Some(dir),
        }
    }

    /// Frames whose files are owned by someone else.
    pub fn borrowed(frames: Vec<SampledFrame>) -> Self {
        Self { frames, _dir: None }
    }

    pub fn frames(&self) -> &[SampledFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// One word or line read from a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    pub confidence: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Take one frame every `interval`, starting at 0, while inside the video.
    /// Fails with [`EngineError::Media`] if the video cannot be opened.
    async fn sample(&self, path: &Path, interval: Duration) -> Result<FrameSet, EngineError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, media: &Path) -> Result<Vec<TranscriptSegment>, EngineError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Read all text in one frame. [`EngineError::Unavailable`] means the
    /// engine itself is missing; anything else concerns this frame only.
    async fn recognize(&self, image: &Path) -> Result<Vec<RecognizedText>, EngineError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    /// Check the secret before any frame is sent.
    async fn connect(&self, api_key: &str) -> Result<(), EngineError>;

    /// Caption one JPEG frame.
    async fn describe(&self, api_key: &str, image: &[u8]) -> Result<String, EngineError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentSynthesizer: Send + Sync {
    /// Turn the fused timeline into a markdown report.
    async fn synthesize(&self, api_key: &str, timeline: &[FusedChunk]) -> Result<String, EngineError>;
}
