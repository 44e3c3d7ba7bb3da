mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::Utc;
use common::{FakeGenerator, FakeTranscoder, RecordingStore};
use scrapify_core::domain::{StageKind, TaskId, TaskRecord, TaskStatus};
use scrapify_core::pipeline::CallContext;
use scrapify_core::ports::TaskStore;
use ulid::Ulid;

fn pending() -> TaskRecord {
    let id = TaskId::from_ulid(Ulid::new());
    TaskRecord::new(id, "lecture.mp4", format!("{id}.mp4"), Utc::now())
}

#[tokio::test]
async fn full_run_produces_result_with_all_grids() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore::default());
    let generator = Arc::new(FakeGenerator::ok());
    let runner = common::runner(
        dir.path(),
        store.clone(),
        Arc::new(FakeTranscoder::with_frames(47)),
        generator.clone(),
    );
    let task = pending();

    let done = runner.run(task.clone(), &CallContext::default()).await;

    assert_eq!(done.status, TaskStatus::Completed);
    let names: Vec<StageKind> = done.stages.iter().map(|s| s.name).collect();
    assert_eq!(names, StageKind::ORDER.to_vec());
    assert!(done.stages.iter().all(|s| s.status == TaskStatus::Completed));

    let result = done.result.as_ref().unwrap();
    assert_eq!(result.transcription.len(), 2);
    assert_eq!(result.study_guide.title, "Rust Ownership");
    assert_eq!(result.study_guide.visual_analysis[0].item_index, 2);
    let id = task.id.to_string();
    let expected: Vec<String> = (1..=3)
        .map(|n| {
            dir.path()
                .join("processed")
                .join(format!("{id}_grid_{n}.jpg"))
                .display()
                .to_string()
        })
        .collect();
    assert_eq!(result.image_paths, expected);
    assert_eq!(result.primary_image(), Some(expected[0].as_str()));
    for path in &result.image_paths {
        assert!(PathBuf::from(path).exists());
    }

    let requests = generator.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].attachments[0].mime_type, "audio/mpeg");
    assert_eq!(requests[1].attachments.len(), 3);
    assert!(requests[1].attachments.iter().all(|a| a.mime_type == "image/jpeg"));
    assert!(requests[1].prompt.contains("Ownership"));

    assert_eq!(store.get(task.id).await.unwrap(), Some(done));
}

#[tokio::test]
async fn every_transition_is_persisted_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore::default());
    let runner = common::runner(
        dir.path(),
        store.clone(),
        Arc::new(FakeTranscoder::with_frames(3)),
        Arc::new(FakeGenerator::ok()),
    );
    let task = pending();
    runner.run(task.clone(), &CallContext::default()).await;

    let snapshots = store.snapshots_of(task.id);
    // processing, then start + finish for each stage; the last finish
    // shares its save with the result.
    assert_eq!(snapshots.len(), 1 + 2 * 4 - 1);
    assert_eq!(snapshots[0].status, TaskStatus::Processing);
    assert!(snapshots[0].stages.is_empty());

    for (i, kind) in StageKind::ORDER.iter().enumerate() {
        let started = &snapshots[1 + 2 * i];
        assert_eq!(started.stages.len(), i + 1);
        assert_eq!(started.stages[i].name, *kind);
        assert_eq!(started.stages[i].status, TaskStatus::Processing);
    }
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, TaskStatus::Completed);
    assert!(last.result.is_some());

    for pair in snapshots.windows(2) {
        assert!(pair[1].updated_at >= pair[0].updated_at);
    }
}

#[tokio::test]
async fn audio_failure_fails_extraction_after_frames_finish() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore::default());
    let mut transcoder = FakeTranscoder::with_frames(5);
    transcoder.fail_audio = Some("Output file does not contain any stream".into());
    let transcoder = Arc::new(transcoder);
    let runner = common::runner(
        dir.path(),
        store.clone(),
        transcoder.clone(),
        Arc::new(FakeGenerator::ok()),
    );
    let task = pending();

    let done = runner.run(task.clone(), &CallContext::default()).await;

    assert_eq!(done.status, TaskStatus::Failed);
    assert_eq!(done.stages.len(), 1);
    let stage = &done.stages[0];
    assert_eq!(stage.name, StageKind::MediaExtraction);
    assert_eq!(stage.status, TaskStatus::Failed);
    assert_eq!(
        stage.error.as_deref(),
        Some("ffmpeg audio extraction failed: Output file does not contain any stream")
    );
    assert!(done.result.is_none());

    // the frames branch ran to completion anyway
    let frames_dir = dir.path().join("snapshots").join(task.id.to_string());
    assert_eq!(std::fs::read_dir(frames_dir).unwrap().count(), 5);
    assert_eq!(transcoder.audio_completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn frame_failure_is_reported_even_when_audio_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let mut transcoder = FakeTranscoder::with_frames(5);
    transcoder.fail_frames = Some("Invalid data found when processing input".into());
    let transcoder = Arc::new(transcoder);
    let runner = common::runner(
        dir.path(),
        Arc::new(RecordingStore::default()),
        transcoder.clone(),
        Arc::new(FakeGenerator::ok()),
    );

    let done = runner.run(pending(), &CallContext::default()).await;

    assert_eq!(done.stages.len(), 1);
    assert!(done.error().unwrap().starts_with("ffmpeg snapshots failed"));
    assert_eq!(transcoder.audio_completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_frames_fails_grid_generation() {
    let dir = tempfile::tempdir().unwrap();
    let runner = common::runner(
        dir.path(),
        Arc::new(RecordingStore::default()),
        Arc::new(FakeTranscoder::with_frames(0)),
        Arc::new(FakeGenerator::ok()),
    );

    let done = runner.run(pending(), &CallContext::default()).await;

    assert_eq!(done.status, TaskStatus::Failed);
    let last = done.stages.last().unwrap();
    assert_eq!(last.name, StageKind::GridGeneration);
    assert_eq!(last.error.as_deref(), Some("no frames extracted"));
}

#[tokio::test]
async fn malformed_transcript_fails_transcription() {
    let dir = tempfile::tempdir().unwrap();
    let generator = FakeGenerator {
        transcript: Ok("```json\nSorry, I cannot help with that.\n```".into()),
        ..FakeGenerator::ok()
    };
    let runner = common::runner(
        dir.path(),
        Arc::new(RecordingStore::default()),
        Arc::new(FakeTranscoder::with_frames(2)),
        Arc::new(generator),
    );

    let done = runner.run(pending(), &CallContext::default()).await;

    assert_eq!(done.status, TaskStatus::Failed);
    assert_eq!(done.stages.len(), 3);
    assert_eq!(done.stages[0].status, TaskStatus::Completed);
    assert_eq!(done.stages[1].status, TaskStatus::Completed);
    let error = done.stages[2].error.as_deref().unwrap();
    assert!(error.starts_with("failed to parse transcription JSON"));
    assert!(error.ends_with("content: Sorry, I cannot help with that."));
}

#[tokio::test]
async fn service_error_fails_study_guide() {
    let dir = tempfile::tempdir().unwrap();
    let generator = FakeGenerator {
        guide: Err("quota exceeded".into()),
        ..FakeGenerator::ok()
    };
    let runner = common::runner(
        dir.path(),
        Arc::new(RecordingStore::default()),
        Arc::new(FakeTranscoder::with_frames(2)),
        Arc::new(generator),
    );

    let done = runner.run(pending(), &CallContext::default()).await;

    assert_eq!(done.status, TaskStatus::Failed);
    assert_eq!(done.stages.len(), 4);
    let last = done.stages.last().unwrap();
    assert_eq!(last.name, StageKind::StudyGuideGeneration);
    assert_eq!(last.error.as_deref(), Some("generative service error: quota exceeded"));
    assert!(done.result.is_none());
}
