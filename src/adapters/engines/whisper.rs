use super::ffmpeg::{spawn_error, stderr_of, FfprobeMedia};
use crate::domain::errors::EngineError;
use crate::domain::timeline::TranscriptSegment;
use crate::ports::engines::{MediaProbe, SpeechToText};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Speech recognition through whisper.cpp's command line.
///
/// The audio track is first decoded to 16 kHz mono WAV with ffmpeg, then
/// `whisper-cli` writes a JSON transcript next to it.
#[derive(Clone, Debug)]
pub struct WhisperCpp {
    whisper_bin: String,
    model: PathBuf,
    ffmpeg_bin: String,
    probe: FfprobeMedia,
}

impl WhisperCpp {
    /// Check that the model file exists. Meant to be called once per worker.
    pub async fn load(
        whisper_bin: impl Into<String>,
        model: PathBuf,
        ffmpeg_bin: impl Into<String>,
        probe: FfprobeMedia,
    ) -> Result<Self, EngineError> {
        tokio::fs::metadata(&model).await.map_err(|e| {
            EngineError::Unavailable(format!("whisper model {}: {}", model.display(), e))
        })?;
        info!(model = %model.display(), "speech model ready");

        Ok(Self {
            whisper_bin: whisper_bin.into(),
            model,
            ffmpeg_bin: ffmpeg_bin.into(),
            probe,
        })
    }

    async fn extract_audio(&self, media: &Path, wav: &Path) -> Result<(), EngineError> {
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-v")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(media)
            .arg("-vn")
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg(wav)
            .output()
            .await
            .map_err(|e| spawn_error(&self.ffmpeg_bin, e))?;

        if !output.status.success() {
            return Err(EngineError::Media(stderr_of(&output)));
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechToText for WhisperCpp {
    async fn transcribe(&self, media: &Path) -> Result<Vec<TranscriptSegment>, EngineError> {
        let info = self.probe.probe(media).await?;
        if !info.has_audio {
            debug!(media = %media.display(), "no audio stream, empty transcript");
            return Ok(Vec::new());
        }

        let dir = tempfile::tempdir()?;
        let wav = dir.path().join("audio.wav");
        self.extract_audio(media, &wav).await?;

        let base = dir.path().join("transcript");
        let output = Command::new(&self.whisper_bin)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(&wav)
            .arg("-oj")
            .arg("-of")
            .arg(&base)
            .arg("-np")
            .output()
            .await
            .map_err(|e| spawn_error(&self.whisper_bin, e))?;

        if !output.status.success() {
            return Err(EngineError::Request(stderr_of(&output)));
        }

        let json = tokio::fs::read_to_string(base.with_extension("json")).await?;
        parse_transcript(&json)
    }
}

#[derive(Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    offsets: Offsets,
    text: String,
}

/// Milliseconds from the start of the audio.
#[derive(Deserialize)]
struct Offsets {
    from: u64,
    to: u64,
}

pub(crate) fn parse_transcript(json: &str) -> Result<Vec<TranscriptSegment>, EngineError> {
    let output: WhisperOutput = serde_json::from_str(json)?;
    Ok(output
        .transcription
        .into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                start: seg.offsets.from as f64 / 1000.0,
                end: seg.offsets.to as f64 / 1000.0,
                text: text.to_string(),
            })
        })
        .collect())
}
