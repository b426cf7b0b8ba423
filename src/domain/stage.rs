//! Stage contract: a stage takes a [`JobContext`] and hands back an outcome.

use super::errors::PipelineError;
use super::jobs::JobContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five stages of the chain, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Transcription,
    StaticText,
    Motion,
    Fusion,
    Synthesis,
}

impl StageName {
    pub const ALL: [StageName; 5] = [
        StageName::Transcription,
        StageName::StaticText,
        StageName::Motion,
        StageName::Fusion,
        StageName::Synthesis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Transcription => "transcription",
            StageName::StaticText => "static_text",
            StageName::Motion => "motion",
            StageName::Fusion => "fusion",
            StageName::Synthesis => "synthesis",
        }
    }

    /// Key of the stage's artifact in the context and in storage.
    pub fn artifact_key(&self) -> &'static str {
        match self {
            StageName::Transcription => "transcription",
            StageName::StaticText => "ocr",
            StageName::Motion => "motion",
            StageName::Fusion => "fused",
            StageName::Synthesis => "final_report",
        }
    }

    pub fn artifact_extension(&self) -> &'static str {
        match self {
            StageName::Synthesis => "md",
            _ => "json",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage decided, visible at the call site.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage did its work.
    Continue(JobContext),
    /// The stage wrote an empty or substitute artifact and the job goes on.
    DegradedContinue { context: JobContext, reason: String },
    /// The job must stop.
    Abort(PipelineError),
}

impl StageOutcome {
    pub fn degraded(context: JobContext, reason: impl Into<String>) -> Self {
        StageOutcome::DegradedContinue {
            context,
            reason: reason.into(),
        }
    }
}

impl From<Result<JobContext, PipelineError>> for StageOutcome {
    fn from(result: Result<JobContext, PipelineError>) -> Self {
        match result {
            Ok(context) => StageOutcome::Continue(context),
            Err(err) => StageOutcome::Abort(err),
        }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    async fn run(&self, context: JobContext) -> StageOutcome;
}
