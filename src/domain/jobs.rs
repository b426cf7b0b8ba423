use super::errors::PipelineError;
use super::stage::StageName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Collaborators that need a secret from the submitting caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    /// Visual-description engine (frame captions).
    Vision,
    /// Document-synthesis engine (final report).
    Synthesis,
}

impl Collaborator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collaborator::Vision => "vision",
            Collaborator::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job secrets, keyed by collaborator.
///
/// Blank secrets are dropped on insert so "provided but empty" and "missing"
/// are the same thing downstream. `Debug` never prints the secret values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials(BTreeMap<Collaborator, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collaborator: Collaborator, secret: impl Into<String>) -> Self {
        self.insert(collaborator, secret);
        self
    }

    pub fn insert(&mut self, collaborator: Collaborator, secret: impl Into<String>) {
        let secret = secret.into();
        let secret = secret.trim();
        if secret.is_empty() {
            self.0.remove(&collaborator);
        } else {
            self.0.insert(collaborator, secret.to_string());
        }
    }

    pub fn get(&self, collaborator: Collaborator) -> Option<&str> {
        self.0.get(&collaborator).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// The record threaded through every stage of one job.
///
/// Artifacts are append-only: [`JobContext::with_artifact`] consumes the
/// context and returns a new one, refusing to point an existing key somewhere
/// else. Credentials are never serialized, so a context can be stored in a job
/// record or logged without leaking secrets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobContext {
    pub processing_id: String,
    pub video_path: PathBuf,
    #[serde(skip)]
    pub credentials: Credentials,
    #[serde(default)]
    artifacts: BTreeMap<String, String>,
}

impl JobContext {
    pub fn new(processing_id: impl Into<String>, video_path: PathBuf, credentials: Credentials) -> Self {
        Self {
            processing_id: processing_id.into(),
            video_path,
            credentials,
            artifacts: BTreeMap::new(),
        }
    }

    pub fn artifact(&self, stage: StageName) -> Option<&str> {
        self.artifacts.get(stage.artifact_key()).map(String::as_str)
    }

    pub fn artifacts(&self) -> &BTreeMap<String, String> {
        &self.artifacts
    }

    /// Record the artifact written by `stage`.
    ///
    /// Writing the same locator again is a no-op, so a re-run stage lands on
    /// the same key; a different locator for an existing key is rejected.
    pub fn with_artifact(
        mut self,
        stage: StageName,
        locator: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let key = stage.artifact_key();
        let locator = locator.into();
        match self.artifacts.get(key) {
            Some(existing) if *existing == locator => Ok(self),
            Some(existing) => Err(PipelineError::ArtifactConflict {
                key: key.to_string(),
                existing: existing.clone(),
                attempted: locator,
            }),
            None => {
                self.artifacts.insert(key.to_string(), locator);
                Ok(self)
            }
        }
    }

    /// Fold the artifacts another branch of the same job produced into this one.
    pub fn merge(mut self, other: &JobContext) -> Result<Self, PipelineError> {
        for (key, locator) in &other.artifacts {
            match self.artifacts.get(key) {
                Some(existing) if existing == locator => {}
                Some(existing) => {
                    return Err(PipelineError::ArtifactConflict {
                        key: key.clone(),
                        existing: existing.clone(),
                        attempted: locator.clone(),
                    })
                }
                None => {
                    self.artifacts.insert(key.clone(), locator.clone());
                }
            }
        }
        Ok(self)
    }

    /// Locator of the final markdown report, once synthesis has run.
    pub fn report_locator(&self) -> Option<&str> {
        self.artifact(StageName::Synthesis)
    }
}

/// Message placed on the job queue: one message runs the whole chain.
///
/// Credentials ride in the envelope rather than in the context so that the
/// context stays safe to persist. Durable queues store them apart from the
/// message (see the Redis adapter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    pub job_id: String,
    pub context: JobContext,
    #[serde(default)]
    pub credentials: Credentials,
}

impl PipelineJob {
    pub fn new(job_id: impl Into<String>, context: JobContext) -> Self {
        let credentials = context.credentials.clone();
        Self {
            job_id: job_id.into(),
            context,
            credentials,
        }
    }

    /// The context a worker should start from, with credentials restored.
    pub fn into_context(self) -> JobContext {
        let mut context = self.context;
        context.credentials = self.credentials;
        context
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Success,
    Failure,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// Payload of a successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub context: JobContext,
    /// Stages that degraded instead of failing, with the reason.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Payload of a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub stage: Option<StageName>,
    pub message: String,
}

impl From<&PipelineError> for JobFailure {
    fn from(err: &PipelineError) -> Self {
        Self {
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

/// Durable status of one job, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub processing_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(id: impl Into<String>, processing_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            processing_id: processing_id.into(),
            status: JobStatus::Pending,
            result: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Terminal copy of this record after the chain succeeded.
    pub fn succeeded(&self, context: JobContext, warnings: Vec<String>) -> Self {
        Self {
            status: JobStatus::Success,
            result: Some(JobOutput { context, warnings }),
            error: None,
            finished_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Terminal copy of this record after the chain aborted.
    pub fn failed(&self, failure: JobFailure) -> Self {
        Self {
            status: JobStatus::Failure,
            result: None,
            error: Some(failure),
            finished_at: Some(Utc::now()),
            ..self.clone()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> JobContext {
        JobContext::new(
            "talk-1234",
            PathBuf::from("uploads/talk-1234.mp4"),
            Credentials::new()
                .with(Collaborator::Vision, "vision-secret")
                .with(Collaborator::Synthesis, "synthesis-secret"),
        )
    }

    #[test]
    fn artifacts_are_append_only() {
        let ctx = context()
            .with_artifact(StageName::Transcription, "store/talk-1234/transcription.json")
            .unwrap();

        // Same locator again is idempotent
        let ctx = ctx
            .with_artifact(StageName::Transcription, "store/talk-1234/transcription.json")
            .unwrap();
        assert_eq!(ctx.artifacts().len(), 1);

        let err = ctx
            .with_artifact(StageName::Transcription, "elsewhere.json")
            .unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactConflict { .. }));
    }

    #[test]
    fn merge_combines_branches() {
        let base = context();
        let a = base
            .clone()
            .with_artifact(StageName::Transcription, "t.json")
            .unwrap();
        let b = base.clone().with_artifact(StageName::StaticText, "o.json").unwrap();

        let merged = base.merge(&a).unwrap().merge(&b).unwrap();
        assert_eq!(merged.artifact(StageName::Transcription), Some("t.json"));
        assert_eq!(merged.artifact(StageName::StaticText), Some("o.json"));
    }

    #[test]
    fn credentials_are_not_serialized() {
        let json = serde_json::to_string(&context()).unwrap();
        assert!(!json.contains("vision-secret"));
        assert!(!json.contains("synthesis-secret"));

        let record = JobRecord::pending("job-1", "talk-1234").succeeded(context(), vec![]);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"SUCCESS\""));
    }

    #[test]
    fn envelope_restores_credentials() {
        let job = PipelineJob::new("job-1", context());
        let json = serde_json::to_string(&job).unwrap();
        let job: PipelineJob = serde_json::from_str(&json).unwrap();
        let ctx = job.into_context();
        assert_eq!(ctx.credentials.get(Collaborator::Vision), Some("vision-secret"));
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let creds = Credentials::new().with(Collaborator::Vision, "   ");
        assert_eq!(creds.get(Collaborator::Vision), None);
        assert_eq!(format!("{:?}", creds), "{}");
    }
}
