mod common;

use common::Harness;
use cortex::application::orchestrator::{ReportLookup, SubmitError};
use cortex::config::PipelineSettings;
use cortex::domain::jobs::{Collaborator, Credentials, JobRecord, JobStatus};
use cortex::domain::stage::StageName;
use cortex::domain::timeline::FusedChunk;
use cortex::ports::storage::StoragePort;

fn both_keys() -> Credentials {
    Credentials::new()
        .with(Collaborator::Vision, "vision-secret")
        .with(Collaborator::Synthesis, "synthesis-secret")
}

async fn run_one(harness: &Harness, credentials: Credentials) -> JobRecord {
    let upload = harness.staged("Q3 Keynote.mp4", "video/mp4").await;
    let submission = harness
        .orchestrator
        .submit(upload, credentials)
        .await
        .unwrap();
    assert!(submission.processing_id.starts_with("Q3_Keynote-"));

    let pending = harness.orchestrator.poll(&submission.job_id).await.unwrap().unwrap();
    assert_eq!(pending.status, JobStatus::Pending);
    assert_eq!(
        harness.orchestrator.report(&submission.job_id).await.unwrap(),
        ReportLookup::Pending
    );

    assert!(harness.worker.process_next(0, 1.0).await.unwrap());

    let first = harness.orchestrator.poll(&submission.job_id).await.unwrap().unwrap();
    let second = harness.orchestrator.poll(&submission.job_id).await.unwrap().unwrap();
    assert!(first.is_terminal());
    assert_eq!(first, second);
    first
}

async fn fused_timeline(harness: &Harness, record: &JobRecord) -> Vec<FusedChunk> {
    let output = record.result.as_ref().unwrap();
    let locator = output.context.artifact(StageName::Fusion).unwrap();
    let data = harness.storage.read(locator).await.unwrap();
    serde_json::from_slice(&data).unwrap()
}

#[tokio::test]
async fn test_job_runs_to_success_with_every_artifact() {
    let harness = Harness::new(false, PipelineSettings::default());
    let record = run_one(&harness, both_keys()).await;

    assert_eq!(record.status, JobStatus::Success);
    assert!(record.finished_at.is_some());
    let output = record.result.as_ref().unwrap();
    assert!(output.warnings.is_empty());
    for stage in StageName::ALL {
        assert!(output.context.artifact(stage).is_some(), "missing {}", stage);
    }

    let timeline = fused_timeline(&harness, &record).await;
    assert!(!timeline.is_empty());
    assert!(timeline[0].spoken.contains("Welcome to the keynote."));
    assert!(timeline[0].visuals.contains("A slide shown at 0s."));
    assert!(timeline
        .iter()
        .all(|chunk| !chunk.on_screen_text.iter().any(|t| t == "smudge")));
    assert!(timeline
        .iter()
        .any(|chunk| chunk.on_screen_text.iter().any(|t| t == "ROADMAP")));

    match harness.orchestrator.report(&record.id).await.unwrap() {
        ReportLookup::Ready(markdown) => assert!(markdown.starts_with("# Keynote")),
        other => panic!("expected a report, got {:?}", other),
    }
}

#[tokio::test]
async fn test_credentials_are_not_persisted() {
    let harness = Harness::new(false, PipelineSettings::default());
    let record = run_one(&harness, both_keys()).await;

    let json = serde_json::to_string(&record).unwrap();
    assert!(!json.contains("vision-secret"));
    assert!(!json.contains("synthesis-secret"));
}

#[tokio::test]
async fn test_missing_vision_key_degrades_to_no_visuals() {
    let harness = Harness::new(false, PipelineSettings::default());
    let credentials = Credentials::new().with(Collaborator::Synthesis, "synthesis-secret");
    let record = run_one(&harness, credentials).await;

    assert_eq!(record.status, JobStatus::Success);
    let output = record.result.as_ref().unwrap();
    assert_eq!(output.warnings.len(), 1);
    assert!(output.warnings[0].starts_with("motion:"));

    let timeline = fused_timeline(&harness, &record).await;
    assert!(timeline.iter().all(|chunk| chunk.visuals.is_empty()));
    assert!(timeline[0].spoken.contains("Welcome"));
}

#[tokio::test]
async fn test_missing_synthesis_key_fails_the_job() {
    let harness = Harness::new(false, PipelineSettings::default());
    let credentials = Credentials::new().with(Collaborator::Vision, "vision-secret");
    let record = run_one(&harness, credentials).await;

    assert_eq!(record.status, JobStatus::Failure);
    assert!(record.result.is_none());
    let failure = record.error.clone().unwrap();
    assert_eq!(failure.stage, Some(StageName::Synthesis));

    match harness.orchestrator.report(&record.id).await.unwrap() {
        ReportLookup::Failed(reported) => assert_eq!(reported, failure),
        other => panic!("expected a failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_synthesis_error_writes_fallback_report() {
    let harness = Harness::new(true, PipelineSettings::default());
    let record = run_one(&harness, both_keys()).await;

    assert_eq!(record.status, JobStatus::Success);
    let output = record.result.as_ref().unwrap();
    assert!(output.warnings.iter().any(|w| w.starts_with("synthesis:")));

    match harness.orchestrator.report(&record.id).await.unwrap() {
        ReportLookup::Ready(markdown) => {
            assert!(markdown.starts_with("# Video Analysis: "));
            assert!(markdown.contains("503 Service Unavailable"));
            assert!(markdown.contains("Welcome to the keynote."));
        }
        other => panic!("expected a fallback report, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fan_out_produces_the_same_artifacts() {
    let settings = PipelineSettings {
        fan_out: true,
        ..PipelineSettings::default()
    };
    let harness = Harness::new(false, settings);
    let record = run_one(&harness, both_keys()).await;

    assert_eq!(record.status, JobStatus::Success);
    let output = record.result.as_ref().unwrap();
    let keys: Vec<&str> = output.context.artifacts().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["final_report", "fused", "motion", "ocr", "transcription"]);
}

#[tokio::test]
async fn test_non_video_upload_is_rejected_before_queueing() {
    let harness = Harness::new(false, PipelineSettings::default());
    let upload = harness.staged("notes.txt", "text/plain").await;
    let staged_path = upload.path.clone();

    let err = harness
        .orchestrator
        .submit(upload, both_keys())
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Input(_)));
    assert!(!staged_path.exists());
    assert!(!harness.worker.process_next(0, 0.05).await.unwrap());
}

#[tokio::test]
async fn test_unknown_job_has_no_record() {
    let harness = Harness::new(false, PipelineSettings::default());
    assert!(harness.orchestrator.poll("nope").await.unwrap().is_none());
    assert_eq!(
        harness.orchestrator.report("nope").await.unwrap(),
        ReportLookup::Unknown
    );
}
