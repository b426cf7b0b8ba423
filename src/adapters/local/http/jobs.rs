use super::upload::{path_is_valid, stream_to_file, StagedFile};
use super::{ApiError, AppState};
use crate::adapters::local::events::JobEvent;
use crate::application::orchestrator::{ReportLookup, StagedUpload, Submission};
use crate::domain::jobs::{Collaborator, Credentials, JobRecord};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use std::path::Path as FsPath;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Video analysis API is running." }))
}

/// `POST /jobs`: multipart with `video_file`, `vision_api_key`, `synthesis_api_key`.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let mut credentials = Credentials::new();
    // Dropped on any early return, which removes the staged file
    let mut upload: Option<(StagedFile, String, Option<String>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video_file" => {
                if upload.is_some() {
                    return Err(ApiError::BadRequest("only one video_file per job".into()));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_owned)
                    .ok_or_else(|| ApiError::BadRequest("video_file must be a file".into()))?;
                if !path_is_valid(FsPath::new(&file_name)) {
                    return Err(ApiError::BadRequest(format!("invalid file name {:?}", file_name)));
                }
                let content_type = field.content_type().map(str::to_owned);
                let staged = StagedFile::new(state.orchestrator.staging_path());
                stream_to_file(staged.path(), field)
                    .await
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                upload = Some((staged, file_name, content_type));
            }
            "vision_api_key" | "synthesis_api_key" => {
                let collaborator = if name == "vision_api_key" {
                    Collaborator::Vision
                } else {
                    Collaborator::Synthesis
                };
                let secret = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                credentials.insert(collaborator, secret);
            }
            _ => {}
        }
    }

    let (staged, file_name, content_type) =
        upload.ok_or_else(|| ApiError::BadRequest("missing video_file".into()))?;
    // From here on `submit` owns the file and its cleanup
    let upload = StagedUpload {
        path: staged.keep(),
        file_name,
        content_type,
    };
    let submission = state.orchestrator.submit(upload, credentials).await?;
    Ok((StatusCode::ACCEPTED, Json(submission)))
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .orchestrator
        .poll(&job_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map(Json)
        .ok_or(ApiError::NotFound(job_id))
}

pub async fn job_report(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lookup = state
        .orchestrator
        .report(&job_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match lookup {
        ReportLookup::Ready(markdown) => Ok((
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            markdown,
        )),
        ReportLookup::Pending => Err(ApiError::Conflict(format!("job {} is still pending", job_id))),
        ReportLookup::Failed(failure) => Err(ApiError::Unprocessable(failure.message)),
        ReportLookup::Unknown => Err(ApiError::NotFound(job_id)),
    }
}

fn terminal_event(record: &JobRecord) -> Result<Event, Infallible> {
    Ok(Event::default()
        .event("terminal")
        .json_data(record)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
}

/// `GET /jobs/{id}/events`: one `terminal` event, then the stream ends.
///
/// A pending job is watched on the in-process hub and, every
/// `store_check`, in the job store.
pub async fn job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<BoxStream<'static, Result<Event, Infallible>>>, ApiError> {
    // Subscribe before reading the record so a completion in between is not lost
    let receiver = state.events.subscribe();
    let record = state
        .orchestrator
        .poll(&job_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(job_id.clone()))?;

    let events = if record.is_terminal() {
        stream::once(async move { terminal_event(&record) }).boxed()
    } else {
        let orchestrator = state.orchestrator.clone();
        let mut store_check = interval(state.store_check);
        store_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stream::unfold(Some((receiver, store_check)), move |watch| {
            let job_id = job_id.clone();
            let orchestrator = orchestrator.clone();
            async move {
                let (mut receiver, mut store_check) = watch?;
                loop {
                    tokio::select! {
                        received = receiver.recv() => match received {
                            Ok(JobEvent::Terminal { record }) if record.id == job_id => {
                                return Some((terminal_event(&record), None));
                            }
                            Ok(_) => {}
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(%job_id, skipped, "event subscriber lagged, checking the store");
                                store_check.reset_immediately();
                            }
                            Err(RecvError::Closed) => return None,
                        },
                        _ = store_check.tick() => match orchestrator.poll(&job_id).await {
                            Ok(Some(record)) if record.is_terminal() => {
                                return Some((terminal_event(&record), None));
                            }
                            Ok(_) => {}
                            Err(e) => warn!(%job_id, error = %e, "cannot read job record"),
                        },
                    }
                }
            }
        })
        .boxed()
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
