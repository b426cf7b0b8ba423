//! Configuration for different deployment environments.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Backend holding the job queue and job records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueBackend {
    /// Redis lists and keys, shared between processes
    Redis,
    /// In-process queue and records, lost on restart
    Memory,
}

impl FromStr for QueueBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(QueueBackend::Redis),
            "memory" | "in-memory" => Ok(QueueBackend::Memory),
            other => Err(format!("unknown queue backend '{}'", other)),
        }
    }
}

/// Knobs of the analysis passes.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    /// Frame sampling interval for on-screen text
    pub ocr_interval: Duration,
    /// Frame sampling interval for visual descriptions
    pub motion_interval: Duration,
    /// Width of one fused timeline bucket, in seconds
    pub fusion_step_seconds: f64,
    /// OCR words at or below this confidence are dropped
    pub ocr_min_confidence: f64,
    /// Run transcription, OCR and motion concurrently
    pub fan_out: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ocr_interval: Duration::from_millis(2000),
            motion_interval: Duration::from_millis(10_000),
            fusion_step_seconds: 5.0,
            ocr_min_confidence: 50.0,
            fan_out: false,
        }
    }
}

impl PipelineSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ocr_interval: env_parse("OCR_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ocr_interval),
            motion_interval: env_parse("MOTION_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.motion_interval),
            fusion_step_seconds: env_parse("FUSION_STEP_SECONDS")
                .filter(|step: &f64| *step > 0.0)
                .unwrap_or(defaults.fusion_step_seconds),
            ocr_min_confidence: env_parse("OCR_MIN_CONFIDENCE")
                .unwrap_or(defaults.ocr_min_confidence),
            fan_out: env_parse("PIPELINE_FAN_OUT").unwrap_or(defaults.fan_out),
        }
    }
}

/// Where the external engines live.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub tesseract_bin: String,
    pub whisper_bin: String,
    /// whisper.cpp ggml model file
    pub whisper_model: PathBuf,
    pub vision_model: String,
    pub vision_endpoint: String,
    pub synthesis_model: String,
    pub synthesis_endpoint: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            ffmpeg_bin: env_or("FFMPEG_BIN", "ffmpeg"),
            ffprobe_bin: env_or("FFPROBE_BIN", "ffprobe"),
            tesseract_bin: env_or("TESSERACT_BIN", "tesseract"),
            whisper_bin: env_or("WHISPER_BIN", "whisper-cli"),
            whisper_model: PathBuf::from(env_or("WHISPER_MODEL", "models/ggml-tiny.bin")),
            vision_model: env_or("VISION_MODEL", "gemini-2.5-flash"),
            vision_endpoint: env_or(
                "VISION_ENDPOINT",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            synthesis_model: env_or("SYNTHESIS_MODEL", "llama-3.1-8b-instant"),
            synthesis_endpoint: env_or(
                "SYNTHESIS_ENDPOINT",
                "https://api.groq.com/openai/v1/chat/completions",
            ),
        }
    }
}

/// Configuration for local/monolith deployment.
#[derive(Clone, Debug)]
pub struct LocalConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Redis connection URL
    pub redis_url: String,
    pub queue_backend: QueueBackend,
    /// Directory for uploaded videos
    pub upload_dir: PathBuf,
    /// Directory for per-job artifacts
    pub artifact_dir: PathBuf,
    /// Number of concurrent worker loops in this process
    pub workers: usize,
    /// Name of this process on the shared queue; must differ between
    /// processes and stay the same across restarts of one process
    pub consumer_name: String,
    pub pipeline: PipelineSettings,
    pub engines: EngineConfig,
}

impl LocalConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let queue_backend = env::var("QUEUE_BACKEND")
            .ok()
            .and_then(|raw| match raw.parse() {
                Ok(backend) => Some(backend),
                Err(e) => {
                    tracing::warn!("{}, falling back to redis", e);
                    None
                }
            })
            .unwrap_or(QueueBackend::Redis);

        Self {
            addr: env_or("ADDR", "127.0.0.1"),
            port: env_or("PORT", "8000"),
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            queue_backend,
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "./video_uploads")),
            artifact_dir: PathBuf::from(env_or("ARTIFACT_DIR", "./video_processing_storage")),
            workers: env_parse("WORKERS").filter(|n: &usize| *n > 0).unwrap_or(4),
            consumer_name: env::var("CONSUMER_NAME")
                .or_else(|_| env::var("HOSTNAME"))
                .unwrap_or_else(|_| String::from("cortex")),
            pipeline: PipelineSettings::from_env(),
            engines: EngineConfig::from_env(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| String::from(default))
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}
