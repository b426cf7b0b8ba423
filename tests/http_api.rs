mod common;

use cortex::adapters::client::{ClientError, HttpJobClient};
use cortex::adapters::local::http::{router, AppState};
use cortex::adapters::local::{EventHub, FsAdapter, MemoryJobRepository, MemoryQueue};
use cortex::application::orchestrator::OrchestratorService;
use cortex::application::pipeline::Pipeline;
use cortex::application::polling::PollPolicy;
use cortex::application::worker::{spawn_workers, WorkerService};
use cortex::config::PipelineSettings;
use cortex::domain::jobs::{JobFailure, JobStatus};
use cortex::domain::stage::StageName;
use cortex::ports::repository::JobStatusRepository;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct Server {
    base_url: String,
    dir: TempDir,
    repo: MemoryJobRepository,
}

async fn start(with_workers: bool) -> Server {
    let dir = tempfile::tempdir().unwrap();
    let queue = MemoryQueue::new();
    let repo = MemoryJobRepository::new();
    let storage = FsAdapter::new(dir.path().join("artifacts"));
    let engines = common::engines(false);
    let events = Arc::new(EventHub::new());

    let pipeline = Pipeline::standard(
        &engines,
        Arc::new(storage.clone()),
        &PipelineSettings::default(),
    );
    let worker = WorkerService::new(
        Arc::new(queue.clone()),
        Arc::new(repo.clone()),
        Arc::new(pipeline),
    )
    .with_events(events.clone());
    let orchestrator = Arc::new(OrchestratorService::new(
        Arc::new(storage),
        Arc::new(queue),
        Arc::new(repo.clone()),
        engines.probe.clone(),
        dir.path().join("uploads"),
    ));

    if with_workers {
        spawn_workers(Arc::new(worker), 1);
    }

    let app = router(
        AppState::new(orchestrator, events).with_store_check(Duration::from_millis(50)),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        base_url: format!("http://{}", addr),
        dir,
        repo,
    }
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        initial_delay: Duration::from_millis(20),
        multiplier: 1.5,
        max_delay: Duration::from_millis(200),
        max_consecutive_errors: 3,
        deadline: None,
    }
    .with_deadline(Duration::from_secs(20))
}

fn write_video(server: &Server, name: &str) -> std::path::PathBuf {
    let path = server.dir.path().join(name);
    std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();
    path
}

#[tokio::test]
async fn test_submit_wait_and_fetch_report() {
    let server = start(true).await;
    let client = HttpJobClient::new(&server.base_url);
    let video = write_video(&server, "keynote.mp4");

    let submission = client
        .submit(&video, Some("vision-secret"), Some("synthesis-secret"))
        .await
        .unwrap();
    assert!(submission.processing_id.starts_with("keynote-"));

    let record = client.wait(&submission.job_id, &fast_policy()).await.unwrap();
    assert_eq!(record.status, JobStatus::Success);

    let report = client.report(&submission.job_id).await.unwrap();
    assert!(report.starts_with("# Keynote"));

    // A finished job answers the event stream with its terminal record at once
    let body = reqwest::get(format!(
        "{}/jobs/{}/events",
        server.base_url, submission.job_id
    ))
    .await
    .unwrap()
    .text()
    .await
    .unwrap();
    assert!(body.contains("event: terminal"));
    assert!(body.contains("\"SUCCESS\""));
}

#[tokio::test]
async fn test_event_stream_sees_job_finished_elsewhere() {
    let server = start(false).await;
    let client = HttpJobClient::new(&server.base_url);
    let video = write_video(&server, "keynote.mp4");
    let submission = client.submit(&video, None, Some("k")).await.unwrap();

    let url = format!("{}/jobs/{}/events", server.base_url, submission.job_id);
    let listener = tokio::spawn(async move { reqwest::get(url).await.unwrap().text().await.unwrap() });

    // Another process finishes the job: the record changes, nothing is published here
    tokio::time::sleep(Duration::from_millis(100)).await;
    let pending = server.repo.get_job(&submission.job_id).await.unwrap().unwrap();
    let failed = pending.failed(JobFailure {
        stage: Some(StageName::Synthesis),
        message: "synthesis stage: missing or invalid synthesis credential".into(),
    });
    assert!(server.repo.complete_job(&failed).await.unwrap());

    let body = tokio::time::timeout(Duration::from_secs(10), listener)
        .await
        .expect("event stream never ended")
        .unwrap();
    assert!(body.contains("event: terminal"));
    assert!(body.contains("\"FAILURE\""));
}

#[tokio::test]
async fn test_report_of_pending_job_is_conflict() {
    let server = start(false).await;
    let client = HttpJobClient::new(&server.base_url);
    let video = write_video(&server, "keynote.mp4");

    let submission = client.submit(&video, None, Some("k")).await.unwrap();
    let record = client.status(&submission.job_id).await.unwrap();
    assert_eq!(record.status, JobStatus::Pending);

    match client.report(&submission.job_id).await {
        Err(ClientError::Status { status, .. }) => assert_eq!(status, 409),
        other => panic!("expected 409, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let server = start(false).await;
    let client = HttpJobClient::new(&server.base_url);

    match client.status("does-not-exist").await {
        Err(ClientError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected 404, got {:?}", other),
    }
    match client.report("does-not-exist").await {
        Err(ClientError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected 404, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_video_upload_is_bad_request() {
    let server = start(false).await;
    let client = HttpJobClient::new(&server.base_url);
    let notes = write_video(&server, "notes.txt");

    match client.submit(&notes, None, None).await {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("error"));
        }
        other => panic!("expected 400, got {:?}", other),
    }
    assert!(staged_files(&server).is_empty());
}

fn staged_files(server: &Server) -> Vec<std::ffi::OsString> {
    match std::fs::read_dir(server.dir.path().join("uploads").join(".staging")) {
        Ok(entries) => entries.map(|entry| entry.unwrap().file_name()).collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_rejected_multipart_leaves_nothing_staged() {
    let server = start(false).await;
    let video = || {
        reqwest::multipart::Part::bytes(b"\x00\x00\x00\x18ftypmp42".to_vec())
            .file_name("keynote.mp4")
            .mime_str("video/mp4")
            .unwrap()
    };
    let form = reqwest::multipart::Form::new()
        .part("video_file", video())
        .part("video_file", video());

    let response = reqwest::Client::new()
        .post(format!("{}/jobs", server.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert!(staged_files(&server).is_empty());
}

#[tokio::test]
async fn test_health() {
    let server = start(false).await;
    let body: serde_json::Value = reqwest::get(format!("{}/", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "Video analysis API is running.");
}
