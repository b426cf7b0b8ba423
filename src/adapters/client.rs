//! HTTP client for the job API.

use crate::application::orchestrator::Submission;
use crate::application::polling::{poll_until_terminal, PollError, PollPolicy};
use crate::domain::jobs::JobRecord;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("cannot read video: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Poll(#[from] PollError),
}

#[derive(Clone, Debug)]
pub struct HttpJobClient {
    client: Client,
    base_url: String,
}

/// Content type announced for an upload, from its extension.
pub fn video_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mpeg") => "video/mpeg",
        _ => "application/octet-stream",
    }
}

impl HttpJobClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn checked(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(ClientError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    /// Upload a video. Blank or absent keys are sent as empty fields.
    pub async fn submit(
        &self,
        video: &Path,
        vision_api_key: Option<&str>,
        synthesis_api_key: Option<&str>,
    ) -> Result<Submission, ClientError> {
        let data = tokio::fs::read(video).await?;
        let file_name = video
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.mp4")
            .to_string();
        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(video_mime(video))?;

        let form = Form::new()
            .part("video_file", part)
            .text("vision_api_key", vision_api_key.unwrap_or_default().to_string())
            .text(
                "synthesis_api_key",
                synthesis_api_key.unwrap_or_default().to_string(),
            );

        let response = self
            .client
            .post(self.url("/jobs"))
            .multipart(form)
            .send()
            .await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobRecord, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}", job_id)))
            .send()
            .await?;
        Ok(Self::checked(response).await?.json().await?)
    }

    pub async fn report(&self, job_id: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/report", job_id)))
            .send()
            .await?;
        Ok(Self::checked(response).await?.text().await?)
    }

    /// Poll until the job is terminal, within `policy`.
    pub async fn wait(&self, job_id: &str, policy: &PollPolicy) -> Result<JobRecord, ClientError> {
        Ok(poll_until_terminal(|| self.status(job_id), policy).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_mime() {
        assert_eq!(video_mime(Path::new("talk.MP4")), "video/mp4");
        assert_eq!(video_mime(Path::new("talk.mov")), "video/quicktime");
        assert_eq!(video_mime(Path::new("talk")), "application/octet-stream");
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpJobClient::new("http://localhost:8000/");
        assert_eq!(client.url("/jobs"), "http://localhost:8000/jobs");
    }
}
