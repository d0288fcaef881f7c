mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{settings, FakeToolkit, FlakyRepository, Harness, ScriptedClient, CANONICAL_TEXT};
use transcriber::db::JobRepository;
use transcriber::job::{FailureReason, Job, JobStatus};
use transcriber::transcription::TranscriptionError;

fn stored(harness: &Harness, job: &Job) -> Job {
    harness.db.find_by_id(&job.id).unwrap().unwrap()
}

#[tokio::test]
async fn test_short_media_is_one_call() {
    let harness = Harness::new(FakeToolkit::with_duration(600.0), ScriptedClient::echo());
    let task = harness.stage("standup.mp3");

    let job = harness.orchestrator.run(task).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.transcription_text, CANONICAL_TEXT);
    assert_eq!(job.progress_percent, 100);
    assert_eq!(job.duration_seconds, Some(600.0));
    assert_eq!(job.segment_count, Some(1));
    assert!(job.error_reason().is_empty());
    assert_eq!(harness.client.calls(), 1);

    let record = stored(&harness, &job);
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.transcription_text, CANONICAL_TEXT);
    assert_eq!(record.segment_count, Some(1));
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn test_long_media_is_split_and_joined_in_order() {
    let harness = Harness::new(FakeToolkit::with_duration(3900.0), ScriptedClient::echo());
    let task = harness.stage("lecture.mp4");

    let job = harness.orchestrator.run(task).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        harness.client.received(),
        vec!["from 0", "from 1800", "from 3600"]
    );
    assert_eq!(job.transcription_text, "from 0\nfrom 1800\nfrom 3600");
    assert_eq!(job.segment_count, Some(3));
    assert_eq!(job.duration_seconds, Some(3900.0));
}

#[tokio::test]
async fn test_quota_on_second_segment_fails_without_partial_text() {
    let client = ScriptedClient::echo()
        .then_text("first part")
        .then_error(TranscriptionError::QuotaExceeded("insufficient_quota".to_string()));
    let harness = Harness::new(FakeToolkit::with_duration(3900.0), client);
    let task = harness.stage("lecture.mp4");

    let job = harness.orchestrator.run(task).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure, Some(FailureReason::QuotaExceeded));
    assert_eq!(job.error_reason(), FailureReason::QuotaExceeded.message());
    assert!(job.transcription_text.is_empty());
    assert!(job.completed_at.is_some());
    // No retry and the third segment is never sent.
    assert_eq!(harness.client.calls(), 2);

    let record = stored(&harness, &job);
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.transcription_text.is_empty());
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let client = ScriptedClient::echo()
        .then_error(TranscriptionError::Transient("502 bad gateway".to_string()))
        .then_error(TranscriptionError::Transient("connection reset".to_string()));
    let harness = Harness::new(FakeToolkit::with_duration(120.0), client);

    let job = harness.orchestrator.run(harness.stage("a.wav")).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.transcription_text, CANONICAL_TEXT);
    assert_eq!(harness.client.calls(), 3);
}

#[tokio::test]
async fn test_transient_errors_exhaust_retry_budget() {
    let client = ScriptedClient::echo()
        .then_error(TranscriptionError::Transient("503".to_string()))
        .then_error(TranscriptionError::Transient("503".to_string()))
        .then_error(TranscriptionError::Transient("503".to_string()));
    let harness = Harness::new(FakeToolkit::with_duration(120.0), client);

    let job = harness.orchestrator.run(harness.stage("a.wav")).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure, Some(FailureReason::ServiceError));
    assert_eq!(harness.client.calls(), 3);
}

#[tokio::test]
async fn test_rate_limit_fails_with_its_own_reason() {
    let client =
        ScriptedClient::echo().then_error(TranscriptionError::RateLimited("429".to_string()));
    let harness = Harness::new(FakeToolkit::with_duration(120.0), client);

    let job = harness.orchestrator.run(harness.stage("a.wav")).await.unwrap();

    assert_eq!(job.failure, Some(FailureReason::RateLimited));
    assert_ne!(
        FailureReason::RateLimited.message(),
        FailureReason::QuotaExceeded.message()
    );
    assert_eq!(harness.client.calls(), 1);
}

#[tokio::test]
async fn test_rate_limit_retried_when_enabled() {
    let work = tempfile::tempdir().unwrap();
    let mut settings = settings(work.path());
    settings.retry.retry_rate_limited = true;
    let client =
        ScriptedClient::echo().then_error(TranscriptionError::RateLimited("429".to_string()));
    let harness = Harness::with_settings(
        work,
        settings,
        FakeToolkit::with_duration(120.0),
        client,
    );

    let job = harness.orchestrator.run(harness.stage("a.wav")).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(harness.client.calls(), 2);
}

#[tokio::test]
async fn test_fatal_error_is_not_retried() {
    let client =
        ScriptedClient::echo().then_error(TranscriptionError::Fatal("401 invalid key".to_string()));
    let harness = Harness::new(FakeToolkit::with_duration(120.0), client);

    let job = harness.orchestrator.run(harness.stage("a.wav")).await.unwrap();

    assert_eq!(job.failure, Some(FailureReason::ServiceError));
    assert_eq!(harness.client.calls(), 1);
}

#[tokio::test]
async fn test_hung_call_times_out_as_transient() {
    let work = tempfile::tempdir().unwrap();
    let mut settings = settings(work.path());
    settings.call_timeout = Duration::from_millis(50);
    let harness = Harness::with_settings(
        work,
        settings,
        FakeToolkit::with_duration(120.0),
        ScriptedClient::echo().then_hang(),
    );

    let job = harness.orchestrator.run(harness.stage("a.wav")).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(harness.client.calls(), 2);
}

#[tokio::test]
async fn test_corrupt_media_fails_without_calls() {
    let harness = Harness::new(FakeToolkit::corrupt(), ScriptedClient::echo());

    let job = harness.orchestrator.run(harness.stage("broken.mkv")).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure, Some(FailureReason::ProcessingFailed));
    assert_eq!(harness.client.calls(), 0);
    assert!(harness.leftover_files().is_empty());
}

#[tokio::test]
async fn test_silent_media_fails_as_processing_error() {
    let harness = Harness::new(FakeToolkit::with_duration(0.0), ScriptedClient::echo());

    let job = harness.orchestrator.run(harness.stage("silence.wav")).await.unwrap();

    assert_eq!(job.failure, Some(FailureReason::ProcessingFailed));
    assert_eq!(harness.client.calls(), 0);
}

#[tokio::test]
async fn test_lost_segment_is_skipped() {
    let toolkit = FakeToolkit::with_duration(3900.0).failing_at(1800);
    let harness = Harness::new(toolkit, ScriptedClient::echo());

    let job = harness.orchestrator.run(harness.stage("lecture.mp4")).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.transcription_text, "from 0\nfrom 3600");
    assert_eq!(job.segment_count, Some(2));
}

#[tokio::test]
async fn test_blank_transcript_fails_as_no_speech() {
    let client = ScriptedClient::echo().then_text("  \n");
    let harness = Harness::new(FakeToolkit::with_duration(60.0), client);

    let job = harness.orchestrator.run(harness.stage("a.wav")).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure, Some(FailureReason::NoSpeech));
    assert!(job.transcription_text.is_empty());
}

#[tokio::test]
async fn test_cleanup_runs_on_every_path() {
    let outcomes = [
        (FakeToolkit::with_duration(3900.0), ScriptedClient::echo()),
        (
            FakeToolkit::with_duration(3900.0),
            ScriptedClient::echo()
                .then_text("x")
                .then_error(TranscriptionError::QuotaExceeded("q".to_string())),
        ),
        (FakeToolkit::corrupt(), ScriptedClient::echo()),
    ];

    for (toolkit, client) in outcomes {
        let harness = Harness::new(toolkit, client);
        let task = harness.stage("lecture.mp4");
        let staged = task.media_path.clone();

        harness.orchestrator.run(task).await.unwrap();

        assert!(!staged.exists());
        assert!(
            harness.leftover_files().is_empty(),
            "leftover: {:?}",
            harness.leftover_files()
        );
    }
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ordered() {
    let harness = Harness::new(FakeToolkit::with_duration(3900.0), ScriptedClient::echo());

    harness.orchestrator.run(harness.stage("lecture.mp4")).await.unwrap();

    let snapshots = harness.progress.snapshots();
    let statuses = harness.progress.statuses();
    assert_eq!(statuses.first(), Some(&JobStatus::Pending));
    assert_eq!(statuses.last(), Some(&JobStatus::Completed));
    assert_eq!(
        statuses.iter().filter(|s| s.is_terminal()).count(),
        1,
        "exactly one terminal snapshot"
    );

    let percents: Vec<u8> = snapshots.iter().map(|j| j.progress_percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);

    let messages: Vec<&str> = snapshots
        .iter()
        .map(|j| j.progress_message.as_str())
        .collect();
    assert!(messages.contains(&"processing audio"));
    assert!(messages.contains(&"transcribing segment 1/3"));
    assert!(messages.contains(&"transcribing segment 2/3"));
    assert!(messages.contains(&"transcribing segment 3/3"));

    let second = snapshots
        .iter()
        .find(|j| j.progress_message == "transcribing segment 2/3")
        .unwrap();
    assert_eq!(second.progress_percent, 33);
}

#[tokio::test]
async fn test_duplicate_record_is_reported_as_error() {
    let harness = Harness::new(FakeToolkit::with_duration(60.0), ScriptedClient::echo());
    let task = harness.stage("a.wav");
    let existing = Job::new(task.job_id.clone(), "a.wav", 11, chrono::Utc::now());
    harness.db.create(&existing).unwrap();
    let staged = task.media_path.clone();

    let result = harness.orchestrator.run(task).await;

    assert!(result.is_err());
    assert_eq!(harness.client.calls(), 0);
    assert!(!staged.exists());
}

// A single-segment run writes four updates: processing started, media
// probed, segment 1/1, terminal state.

#[tokio::test]
async fn test_store_failure_mid_run_is_reported_and_cleaned_up() {
    let harness = Harness::with_repository(
        |db| Arc::new(FlakyRepository::failing_from(db, 1)),
        FakeToolkit::with_duration(60.0),
        ScriptedClient::echo(),
    );
    let task = harness.stage("a.mp3");
    let staged = task.media_path.clone();

    let result = harness.orchestrator.run(task.clone()).await;

    assert!(result.is_err());
    assert_eq!(harness.client.calls(), 0);
    assert!(!staged.exists());
    assert!(harness.leftover_files().is_empty());
    let record = harness.db.find_by_id(&task.job_id).unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Processing);
}

#[tokio::test]
async fn test_store_failure_on_terminal_write_is_reported() {
    let harness = Harness::with_repository(
        |db| Arc::new(FlakyRepository::failing_once(db, 3)),
        FakeToolkit::with_duration(60.0),
        ScriptedClient::echo(),
    );
    let task = harness.stage("a.mp3");

    let result = harness.orchestrator.run(task.clone()).await;

    assert!(result.is_err());
    assert_eq!(harness.client.calls(), 1);
    assert!(harness.leftover_files().is_empty());
    let record = harness.db.find_by_id(&task.job_id).unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Processing);
    assert!(record.transcription_text.is_empty());
    assert!(!harness
        .progress
        .statuses()
        .iter()
        .any(|s| s.is_terminal()));
}

#[tokio::test]
async fn test_transient_store_failure_ends_as_failed_record() {
    let harness = Harness::with_repository(
        |db| Arc::new(FlakyRepository::failing_once(db, 1)),
        FakeToolkit::with_duration(60.0),
        ScriptedClient::echo(),
    );
    let task = harness.stage("a.mp3");

    let job = harness.orchestrator.run(task).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure, Some(FailureReason::ProcessingFailed));
    assert_eq!(harness.client.calls(), 0);
    assert!(harness.leftover_files().is_empty());
    let record = stored(&harness, &job);
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.failure, Some(FailureReason::ProcessingFailed));
}
