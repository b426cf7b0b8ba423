//! HTTP inbound adapter.
//!
//! Clients submit videos, poll job records, fetch the final report and can
//! subscribe to a completion event instead of polling.

pub mod jobs;
pub mod upload;

use crate::adapters::local::events::hub::EventHub;
use crate::application::orchestrator::{OrchestratorService, SubmitError};
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<OrchestratorService>,
    pub events: Arc<EventHub>,
    /// How often an event stream re-reads a pending job's record. Jobs
    /// finished by another process never reach this process's hub.
    pub store_check: Duration,
}

impl AppState {
    pub fn new(orchestrator: Arc<OrchestratorService>, events: Arc<EventHub>) -> Self {
        Self {
            orchestrator,
            events,
            store_check: Duration::from_secs(2),
        }
    }

    pub fn with_store_check(mut self, every: Duration) -> Self {
        self.store_check = every;
        self
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unknown job {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Internal(String),
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Input(message) => ApiError::BadRequest(message),
            SubmitError::Internal(message) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(message) => {
                error!(%message, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(jobs::health))
        .route("/jobs", post(jobs::submit_job))
        .route("/jobs/:id", get(jobs::job_status))
        .route("/jobs/:id/report", get(jobs::job_report))
        .route("/jobs/:id/events", get(jobs::job_events))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
