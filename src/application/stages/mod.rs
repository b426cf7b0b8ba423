//! The five stages of the analysis chain.

pub mod fusion;
pub mod motion;
pub mod static_text;
pub mod synthesis;
pub mod transcription;

pub use fusion::FusionStage;
pub use motion::MotionStage;
pub use static_text::StaticTextStage;
pub use synthesis::SynthesisStage;
pub use transcription::TranscriptionStage;

use crate::application::speech::SpeechModel;
use crate::ports::engines::{
    DocumentSynthesizer, FrameSampler, MediaProbe, TextRecognizer, VisionDescriber,
};
use std::sync::Arc;

/// Engines a worker hands to its stages.
#[derive(Clone)]
pub struct Engines {
    pub probe: Arc<dyn MediaProbe>,
    pub sampler: Arc<dyn FrameSampler>,
    pub speech: Arc<SpeechModel>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub describer: Arc<dyn VisionDescriber>,
    pub synthesizer: Arc<dyn DocumentSynthesizer>,
}
