//! Runs the stage chain for one job.

use super::stages::{
    Engines, FusionStage, MotionStage, StaticTextStage, SynthesisStage, TranscriptionStage,
};
use crate::config::PipelineSettings;
use crate::domain::errors::PipelineError;
use crate::domain::jobs::JobContext;
use crate::domain::stage::{Stage, StageName, StageOutcome};
use crate::ports::storage::StoragePort;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// One position in the chain.
pub enum Step {
    Single(Arc<dyn Stage>),
    /// Independent stages run concurrently on copies of the same context;
    /// their artifacts are merged before the next step.
    Parallel(Vec<Arc<dyn Stage>>),
}

/// Result of a chain that ran to the end.
#[derive(Debug)]
pub struct PipelineRun {
    pub context: JobContext,
    /// One entry per stage that degraded, `"<stage>: <reason>"`.
    pub warnings: Vec<String>,
}

pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Transcription, static text, motion, fusion, synthesis. With
    /// `settings.fan_out` the first three share one parallel step.
    pub fn standard(
        engines: &Engines,
        storage: Arc<dyn StoragePort>,
        settings: &PipelineSettings,
    ) -> Self {
        let transcription: Arc<dyn Stage> = Arc::new(TranscriptionStage::new(
            engines.speech.clone(),
            storage.clone(),
        ));
        let static_text: Arc<dyn Stage> = Arc::new(StaticTextStage::new(
            engines.sampler.clone(),
            engines.recognizer.clone(),
            storage.clone(),
            settings.ocr_interval,
            settings.ocr_min_confidence,
        ));
        let motion: Arc<dyn Stage> = Arc::new(MotionStage::new(
            engines.sampler.clone(),
            engines.describer.clone(),
            storage.clone(),
            settings.motion_interval,
        ));
        let fusion: Arc<dyn Stage> = Arc::new(FusionStage::new(
            engines.probe.clone(),
            storage.clone(),
            settings.fusion_step_seconds,
        ));
        let synthesis: Arc<dyn Stage> =
            Arc::new(SynthesisStage::new(engines.synthesizer.clone(), storage));

        let mut steps = if settings.fan_out {
            vec![Step::Parallel(vec![transcription, static_text, motion])]
        } else {
            vec![
                Step::Single(transcription),
                Step::Single(static_text),
                Step::Single(motion),
            ]
        };
        steps.push(Step::Single(fusion));
        steps.push(Step::Single(synthesis));
        Self::new(steps)
    }

    /// Stage names in execution order; parallel stages in declaration order.
    pub fn stage_names(&self) -> Vec<StageName> {
        self.steps
            .iter()
            .flat_map(|step| match step {
                Step::Single(stage) => vec![stage.name()],
                Step::Parallel(stages) => stages.iter().map(|s| s.name()).collect(),
            })
            .collect()
    }

    /// Run every step in order. Stage k+1 only starts after stage k returned
    /// a context; the first abort ends the run.
    pub async fn run(&self, context: JobContext) -> Result<PipelineRun, PipelineError> {
        let mut context = context;
        let mut warnings = Vec::new();

        for step in &self.steps {
            context = match step {
                Step::Single(stage) => {
                    let outcome = run_stage(stage.as_ref(), context).await;
                    settle(stage.name(), outcome, &mut warnings)?
                }
                Step::Parallel(stages) => {
                    let outcomes = join_all(
                        stages
                            .iter()
                            .map(|stage| run_stage(stage.as_ref(), context.clone())),
                    )
                    .await;

                    let mut merged = context;
                    for (stage, outcome) in stages.iter().zip(outcomes) {
                        let branch = settle(stage.name(), outcome, &mut warnings)?;
                        merged = merged.merge(&branch)?;
                    }
                    merged
                }
            };
        }

        Ok(PipelineRun { context, warnings })
    }
}

async fn run_stage(stage: &dyn Stage, context: JobContext) -> StageOutcome {
    info!(processing_id = %context.processing_id, stage = %stage.name(), "stage started");
    stage.run(context).await
}

fn settle(
    stage: StageName,
    outcome: StageOutcome,
    warnings: &mut Vec<String>,
) -> Result<JobContext, PipelineError> {
    match outcome {
        StageOutcome::Continue(context) => {
            info!(processing_id = %context.processing_id, %stage, "stage finished");
            Ok(context)
        }
        StageOutcome::DegradedContinue { context, reason } => {
            warn!(processing_id = %context.processing_id, %stage, %reason, "stage degraded");
            warnings.push(format!("{}: {}", stage, reason));
            Ok(context)
        }
        StageOutcome::Abort(err) => {
            warn!(%stage, error = %err, "stage aborted the job");
            Err(err)
        }
    }
}
