//! Error types shared by the pipeline and its collaborators.

use super::jobs::Collaborator;
use super::stage::StageName;
use thiserror::Error;

/// Errors that end a job (or, for `Input`, stop it from ever being queued).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unreadable or invalid media, reported to the submitter.
    #[error("invalid input: {0}")]
    Input(String),

    #[error("{stage} stage: missing or invalid {collaborator} credential")]
    Credential {
        stage: StageName,
        collaborator: Collaborator,
    },

    #[error("{stage} stage failed: {detail}")]
    Stage { stage: StageName, detail: String },

    #[error("{stage} stage could not read the '{key}' artifact: {detail}")]
    MissingArtifact {
        stage: StageName,
        key: String,
        detail: String,
    },

    #[error("artifact '{key}' already points to {existing}, refusing {attempted}")]
    ArtifactConflict {
        key: String,
        existing: String,
        attempted: String,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    pub fn stage_failed(stage: StageName, detail: impl ToString) -> Self {
        PipelineError::Stage {
            stage,
            detail: detail.to_string(),
        }
    }

    /// The stage the error originated in, when known.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            PipelineError::Credential { stage, .. }
            | PipelineError::Stage { stage, .. }
            | PipelineError::MissingArtifact { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Failures reported by external collaborators.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary or model is not installed.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The media file cannot be opened or decoded.
    #[error("cannot open media: {0}")]
    Media(String),

    /// The collaborator rejected the secret.
    #[error("credential rejected: {0}")]
    Credential(String),

    /// A single frame failed; callers skip it.
    #[error("frame at {timestamp:.1}s failed: {detail}")]
    Frame { timestamp: f64, detail: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Malformed(err.to_string())
    }
}
