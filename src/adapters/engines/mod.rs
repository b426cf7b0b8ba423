//! Concrete engines behind the ports in `ports::engines`.
//!
//! Local binaries (ffmpeg, tesseract, whisper.cpp) are driven as child
//! processes; the hosted collaborators are plain HTTPS calls.

pub mod ffmpeg;
pub mod gemini;
pub mod groq;
pub mod tesseract;
pub mod whisper;

pub use ffmpeg::{FfmpegFrameSampler, FfprobeMedia};
pub use gemini::GeminiVision;
pub use groq::GroqSynthesizer;
pub use tesseract::TesseractCli;
pub use whisper::WhisperCpp;

use crate::application::speech::SpeechModel;
use crate::application::stages::Engines;
use crate::config::EngineConfig;
use crate::domain::errors::EngineError;
use crate::ports::engines::SpeechToText;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;

/// Wire the local binaries and hosted collaborators named in `config`.
///
/// The whisper model is only checked when the first transcription runs.
pub fn local_engines(config: &EngineConfig) -> Engines {
    let probe = FfprobeMedia::new(&config.ffprobe_bin);
    let client = Client::new();

    let whisper = (
        config.whisper_bin.clone(),
        config.whisper_model.clone(),
        config.ffmpeg_bin.clone(),
        probe.clone(),
    );
    let speech = SpeechModel::lazy(move || {
        let (bin, model, ffmpeg, probe) = whisper.clone();
        async move {
            let engine: Arc<dyn SpeechToText> =
                Arc::new(WhisperCpp::load(bin, model, ffmpeg, probe).await?);
            Ok::<_, EngineError>(engine)
        }
    });

    Engines {
        probe: Arc::new(probe.clone()),
        sampler: Arc::new(FfmpegFrameSampler::new(&config.ffmpeg_bin, probe)),
        speech: Arc::new(speech),
        recognizer: Arc::new(TesseractCli::new(&config.tesseract_bin)),
        describer: Arc::new(GeminiVision::new(
            client.clone(),
            &config.vision_endpoint,
            &config.vision_model,
        )),
        synthesizer: Arc::new(GroqSynthesizer::new(
            client,
            &config.synthesis_endpoint,
            &config.synthesis_model,
        )),
    }
}

/// Map a non-2xx answer: rejected secrets become [`EngineError::Credential`].
pub(crate) async fn check_status(response: Response) -> Result<Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, body))
}

fn classify_status(status: StatusCode, body: String) -> EngineError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EngineError::Credential(format!("{}: {}", status, body))
        }
        // Gemini answers an unknown key with 400 API_KEY_INVALID
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => {
            EngineError::Credential(format!("{}: {}", status, body))
        }
        _ => EngineError::Request(format!("{}: {}", status, body)),
    }
}
