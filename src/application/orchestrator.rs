use crate::domain::jobs::{Credentials, JobContext, JobFailure, JobRecord, JobStatus, PipelineJob};
use crate::ports::engines::MediaProbe;
use crate::ports::queue::JobQueuePort;
use crate::ports::repository::JobStatusRepository;
use crate::ports::storage::StoragePort;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "mov", "mkv", "webm", "avi", "m4v", "mpeg"];

/// An upload already streamed to disk, waiting for validation.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub path: PathBuf,
    /// Name the client gave the file
    pub file_name: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The upload is not a usable video. The job is never enqueued.
    #[error("{0}")]
    Input(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Identifiers handed back to the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub job_id: String,
    pub processing_id: String,
}

/// What a caller asking for the final report gets.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportLookup {
    Unknown,
    Pending,
    Failed(JobFailure),
    Ready(String),
}

pub struct OrchestratorService {
    storage: Arc<dyn StoragePort>,
    queue: Arc<dyn JobQueuePort>,
    repo: Arc<dyn JobStatusRepository>,
    probe: Arc<dyn MediaProbe>,
    upload_dir: PathBuf,
}

impl OrchestratorService {
    pub fn new(
        storage: Arc<dyn StoragePort>,
        queue: Arc<dyn JobQueuePort>,
        repo: Arc<dyn JobStatusRepository>,
        probe: Arc<dyn MediaProbe>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            queue,
            repo,
            probe,
            upload_dir: upload_dir.into(),
        }
    }

    /// A fresh path where an incoming upload can be streamed before `submit`.
    pub fn staging_path(&self) -> PathBuf {
        self.upload_dir
            .join(".staging")
            .join(Uuid::new_v4().simple().to_string())
    }

    /// Validate the upload, record the job as PENDING and enqueue the chain.
    ///
    /// Returns as soon as the job is queued. Invalid media is reported as
    /// [`SubmitError::Input`] and the staged file is removed. If the job
    /// cannot be queued its record is closed as FAILURE and the video removed.
    pub async fn submit(
        &self,
        upload: StagedUpload,
        credentials: Credentials,
    ) -> Result<Submission, SubmitError> {
        let checked = self.validate(&upload).await;
        let extension = match checked {
            Ok(extension) => extension,
            Err(e) => {
                let _ = tokio::fs::remove_file(&upload.path).await;
                return Err(e);
            }
        };

        let processing_id = processing_id(&upload.file_name);
        let job_id = Uuid::new_v4().to_string();

        if let Err(e) = tokio::fs::create_dir_all(&self.upload_dir).await {
            discard_upload(&upload.path).await;
            return Err(SubmitError::Internal(e.to_string()));
        }
        let video_path = self
            .upload_dir
            .join(format!("{}.{}", processing_id, extension));
        if let Err(e) = move_file(&upload.path, &video_path).await {
            discard_upload(&upload.path).await;
            return Err(SubmitError::Internal(format!("storing upload: {}", e)));
        }

        let record = JobRecord::pending(job_id.clone(), processing_id.clone());
        if let Err(e) = self.repo.create_job(&record).await {
            discard_upload(&video_path).await;
            return Err(SubmitError::Internal(e.to_string()));
        }

        let context = JobContext::new(processing_id.clone(), video_path.clone(), credentials);
        if let Err(e) = self
            .queue
            .enqueue_job(PipelineJob::new(job_id.clone(), context))
            .await
        {
            // Nothing will ever run this job: close its record now
            let message = format!("job could not be queued: {}", e);
            warn!(%job_id, error = %e, "enqueue failed, marking job failed");
            let failed = record.failed(JobFailure {
                stage: None,
                message: message.clone(),
            });
            if let Err(e) = self.repo.complete_job(&failed).await {
                warn!(%job_id, error = %e, "could not record the enqueue failure");
            }
            discard_upload(&video_path).await;
            return Err(SubmitError::Internal(message));
        }

        info!(%job_id, %processing_id, "job submitted");
        Ok(Submission {
            job_id,
            processing_id,
        })
    }

    /// Returns the extension the stored video will carry.
    async fn validate(&self, upload: &StagedUpload) -> Result<String, SubmitError> {
        let extension = Path::new(&upload.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match upload.content_type.as_deref() {
            Some(mime) if mime.starts_with("video/") => {}
            // Clients that do not know the type: trust a video extension
            None | Some("application/octet-stream")
                if extension
                    .as_deref()
                    .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e)) => {}
            Some(mime) => {
                return Err(SubmitError::Input(format!(
                    "'{}' is not a video (content type {})",
                    upload.file_name, mime
                )))
            }
            None => {
                return Err(SubmitError::Input(format!(
                    "'{}' is not a recognized video file",
                    upload.file_name
                )))
            }
        }

        let media = self
            .probe
            .probe(&upload.path)
            .await
            .map_err(|e| SubmitError::Input(format!("unreadable media: {}", e)))?;
        if !media.has_video {
            return Err(SubmitError::Input(format!(
                "'{}' has no video stream",
                upload.file_name
            )));
        }

        Ok(extension.unwrap_or_else(|| "mp4".to_string()))
    }

    pub async fn poll(&self, job_id: &str) -> Result<Option<JobRecord>, Box<dyn Error + Send + Sync>> {
        self.repo.get_job(job_id).await
    }

    pub async fn report(&self, job_id: &str) -> Result<ReportLookup, Box<dyn Error + Send + Sync>> {
        let Some(record) = self.repo.get_job(job_id).await? else {
            return Ok(ReportLookup::Unknown);
        };

        match record.status {
            JobStatus::Pending => Ok(ReportLookup::Pending),
            JobStatus::Failure => Ok(ReportLookup::Failed(record.error.unwrap_or(JobFailure {
                stage: None,
                message: "job failed".to_string(),
            }))),
            JobStatus::Success => {
                let locator = record
                    .result
                    .as_ref()
                    .and_then(|output| output.context.report_locator())
                    .ok_or_else(|| format!("job {} succeeded without a report", job_id))?;
                let data = self.storage.read(locator).await?;
                Ok(ReportLookup::Ready(String::from_utf8(data)?))
            }
        }
    }
}

/// `<file stem>-<uuid>`: readable in artifact paths, unique across uploads
/// that share a file name.
pub fn processing_id(file_name: &str) -> String {
    static UNSAFE: OnceLock<Option<Regex>> = OnceLock::new();

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let stem = match UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]+").ok()) {
        Some(unsafe_chars) => unsafe_chars.replace_all(stem, "_").into_owned(),
        None => stem.to_string(),
    };
    let stem: String = stem.trim_matches('_').chars().take(48).collect();
    let stem = if stem.is_empty() { "video".to_string() } else { stem };

    format!("{}-{}", stem, Uuid::new_v4().simple())
}

async fn discard_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "could not remove upload of rejected job");
    }
}

async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    // Staging may sit on another filesystem
    tokio::fs::copy(from, to).await?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        warn!(path = %from.display(), error = %e, "could not remove staged upload");
    }
    Ok(())
}
