use crate::application::artifacts;
use crate::domain::errors::{EngineError, PipelineError};
use crate::domain::jobs::{Collaborator, JobContext};
use crate::domain::stage::{Stage, StageName, StageOutcome};
use crate::domain::timeline::FusedChunk;
use crate::ports::engines::DocumentSynthesizer;
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Turns the fused timeline into the final markdown report.
///
/// A missing or rejected credential aborts the job. Any other synthesis
/// failure writes a fallback report embedding the raw timeline, and the job
/// succeeds with a warning.
pub struct SynthesisStage {
    synthesizer: Arc<dyn DocumentSynthesizer>,
    storage: Arc<dyn StoragePort>,
}

impl SynthesisStage {
    pub fn new(synthesizer: Arc<dyn DocumentSynthesizer>, storage: Arc<dyn StoragePort>) -> Self {
        Self {
            synthesizer,
            storage,
        }
    }

    fn credential_error(&self) -> PipelineError {
        PipelineError::Credential {
            stage: self.name(),
            collaborator: Collaborator::Synthesis,
        }
    }
}

pub fn fallback_document(
    processing_id: &str,
    error: &EngineError,
    timeline: &[FusedChunk],
) -> String {
    let raw = serde_json::to_string_pretty(timeline).unwrap_or_else(|_| "[]".to_string());
    format!(
        "# Video Analysis: {}\n\nReport synthesis failed: {}\n\nFused timeline:\n\n```json\n{}\n```\n",
        processing_id, error, raw
    )
}

#[async_trait]
impl Stage for SynthesisStage {
    fn name(&self) -> StageName {
        StageName::Synthesis
    }

    async fn run(&self, context: JobContext) -> StageOutcome {
        let Some(api_key) = context
            .credentials
            .get(Collaborator::Synthesis)
            .map(str::to_owned)
        else {
            return StageOutcome::Abort(self.credential_error());
        };

        let timeline: Vec<FusedChunk> = match artifacts::load_json(
            self.storage.as_ref(),
            &context,
            self.name(),
            StageName::Fusion,
        )
        .await
        {
            Ok(timeline) => timeline,
            Err(e) => return StageOutcome::Abort(e),
        };

        match self.synthesizer.synthesize(&api_key, &timeline).await {
            Ok(document) => {
                info!(
                    processing_id = %context.processing_id,
                    chunks = timeline.len(),
                    "report synthesized"
                );
                artifacts::store(self.storage.as_ref(), context, self.name(), document.as_bytes())
                    .await
                    .into()
            }
            Err(EngineError::Credential(detail)) => {
                warn!(processing_id = %context.processing_id, %detail, "synthesis credential rejected");
                StageOutcome::Abort(self.credential_error())
            }
            Err(e) => {
                warn!(
                    processing_id = %context.processing_id,
                    error = %e,
                    "synthesis failed, writing fallback report"
                );
                let document = fallback_document(&context.processing_id, &e, &timeline);
                match artifacts::store(self.storage.as_ref(), context, self.name(), document.as_bytes())
                    .await
                {
                    Ok(context) => StageOutcome::degraded(
                        context,
                        format!("report synthesis failed, fallback report written: {}", e),
                    ),
                    Err(e) => StageOutcome::Abort(e),
                }
            }
        }
    }
}
