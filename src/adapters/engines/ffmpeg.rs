//! Media probing and frame sampling through the ffprobe/ffmpeg binaries.

use crate::domain::errors::EngineError;
use crate::ports::engines::{FrameSampler, FrameSet, MediaInfo, MediaProbe, SampledFrame};
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Map a spawn failure: a missing binary means the engine is not installed.
pub(crate) fn spawn_error(bin: &str, err: io::Error) -> EngineError {
    if err.kind() == io::ErrorKind::NotFound {
        EngineError::Unavailable(format!("'{}' not found on PATH", bin))
    } else {
        EngineError::Io(err)
    }
}

pub(crate) fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[derive(Clone, Debug)]
pub struct FfprobeMedia {
    ffprobe_bin: String,
}

impl FfprobeMedia {
    pub fn new(ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeMedia {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError> {
        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-show_format")
            .arg("-show_streams")
            .arg("-print_format")
            .arg("json")
            .arg(path)
            .output()
            .await
            .map_err(|e| spawn_error(&self.ffprobe_bin, e))?;

        if !output.status.success() {
            return Err(EngineError::Media(format!(
                "{}: {}",
                path.display(),
                stderr_of(&output)
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// ffprobe prints numbers as strings; accept either.
fn number(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

pub(crate) fn parse_probe_output(json: &str) -> Result<MediaInfo, EngineError> {
    let v: Value = serde_json::from_str(json)?;

    let streams = v
        .get("streams")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let has_type = |kind: &str| {
        streams
            .iter()
            .any(|s| s.get("codec_type").and_then(Value::as_str) == Some(kind))
    };

    let format_duration = number(v.get("format").and_then(|f| f.get("duration")));
    let stream_duration = streams
        .iter()
        .filter_map(|s| number(s.get("duration")))
        .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))));

    let duration = format_duration
        .or(stream_duration)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| EngineError::Media("no duration reported".to_string()))?;

    Ok(MediaInfo {
        duration,
        has_video: has_type("video"),
        has_audio: has_type("audio"),
    })
}

/// Grabs one JPEG per sampling instant by seeking, so frame timestamps are
/// exact multiples of the interval.
#[derive(Clone, Debug)]
pub struct FfmpegFrameSampler {
    ffmpeg_bin: String,
    probe: FfprobeMedia,
}

impl FfmpegFrameSampler {
    pub fn new(ffmpeg_bin: impl Into<String>, probe: FfprobeMedia) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            probe,
        }
    }

    async fn grab(&self, video: &Path, timestamp: f64, out: &Path) -> Result<(), EngineError> {
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-v")
            .arg("error")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", timestamp))
            .arg("-i")
            .arg(video)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg(out)
            .output()
            .await
            .map_err(|e| spawn_error(&self.ffmpeg_bin, e))?;

        if !output.status.success() || !out.exists() {
            return Err(EngineError::Frame {
                timestamp,
                detail: stderr_of(&output),
            });
        }
        Ok(())
    }
}

/// Sampling instants `0, interval, 2 * interval, ...` strictly before `duration`.
pub(crate) fn sample_times(duration: f64, interval: Duration) -> Vec<f64> {
    let step = interval.as_secs_f64();
    if step <= 0.0 || duration <= 0.0 {
        return Vec::new();
    }
    (0..)
        .map(|k| k as f64 * step)
        .take_while(|t| *t < duration)
        .collect()
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(&self, path: &Path, interval: Duration) -> Result<FrameSet, EngineError> {
        if interval.is_zero() {
            return Err(EngineError::Request("sampling interval must be positive".into()));
        }

        let info = self.probe.probe(path).await?;
        if !info.has_video {
            return Err(EngineError::Media(format!(
                "{} has no video stream",
                path.display()
            )));
        }

        let dir = tempfile::tempdir()?;
        let mut frames = Vec::new();
        for (index, timestamp) in sample_times(info.duration, interval).into_iter().enumerate() {
            let out = dir.path().join(format!("frame_{:05}.jpg", index));
            match self.grab(path, timestamp, &out).await {
                Ok(()) => frames.push(SampledFrame {
                    timestamp,
                    path: out,
                }),
                Err(EngineError::Frame { timestamp, detail }) => {
                    warn!(timestamp, %detail, "could not extract frame, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        debug!(count = frames.len(), video = %path.display(), "sampled frames");
        Ok(FrameSet::new(frames, dir))
    }
}
