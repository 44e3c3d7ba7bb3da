use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rstest::rstest;
use scrapify_core::domain::{StageKind, TaskId, TaskRecord, TaskStatus};
use scrapify_core::impls::{InMemoryTaskStore, JsonFileTaskStore};
use scrapify_core::ports::TaskStore;
use ulid::Ulid;

fn record(name: &str) -> TaskRecord {
    TaskRecord::new(TaskId::from_ulid(Ulid::new()), name, name, Utc::now())
}

async fn json_store(dir: &tempfile::TempDir) -> Arc<dyn TaskStore> {
    Arc::new(
        JsonFileTaskStore::open(dir.path().join("tasks.json"))
            .await
            .unwrap(),
    )
}

async fn store(kind: &str, dir: &tempfile::TempDir) -> Arc<dyn TaskStore> {
    match kind {
        "json" => json_store(dir).await,
        _ => Arc::new(InMemoryTaskStore::new()),
    }
}

#[rstest]
#[case::json("json")]
#[case::memory("memory")]
#[tokio::test]
async fn save_is_an_idempotent_upsert(#[case] kind: &str) {
    let dir = tempfile::tempdir().unwrap();
    let store = store(kind, &dir).await;
    let task = record("a.mp4");

    store.save(&task).await.unwrap();
    store.save(&task).await.unwrap();

    assert_eq!(store.list().await.unwrap(), vec![task.clone()]);
    assert_eq!(store.get(task.id).await.unwrap(), Some(task));
}

#[rstest]
#[case::json("json")]
#[case::memory("memory")]
#[tokio::test]
async fn unknown_id_is_not_found_not_error(#[case] kind: &str) {
    let dir = tempfile::tempdir().unwrap();
    let store = store(kind, &dir).await;
    store.save(&record("a.mp4")).await.unwrap();

    let missing = store.get(TaskId::from_ulid(Ulid::new())).await.unwrap();
    assert!(missing.is_none());
}

#[rstest]
#[case::json("json")]
#[case::memory("memory")]
#[tokio::test]
async fn last_write_wins(#[case] kind: &str) {
    let dir = tempfile::tempdir().unwrap();
    let store = store(kind, &dir).await;
    let mut task = record("a.mp4");
    store.save(&task).await.unwrap();

    task.start_processing(Utc::now());
    let idx = task.begin_stage(StageKind::MediaExtraction, Utc::now()).unwrap();
    task.finish_stage(idx, Duration::from_millis(3), Err("boom".into()), Utc::now());
    store.save(&task).await.unwrap();

    let stored = store.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored, task);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_of_distinct_tasks_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = json_store(&dir).await;

    let tasks: Vec<TaskRecord> = (0..20).map(|i| record(&format!("{i}.mp4"))).collect();
    let mut handles = Vec::new();
    for task in tasks.clone() {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.save(&task).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = store.list().await.unwrap();
    assert_eq!(stored.len(), tasks.len());
    for task in &tasks {
        assert_eq!(store.get(task.id).await.unwrap().as_ref(), Some(task));
    }

    let text = std::fs::read_to_string(dir.path().join("tasks.json")).unwrap();
    let parsed: Vec<TaskRecord> = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_always_see_a_complete_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = json_store(&dir).await;
    let mut task = record("a.mp4");
    store.save(&task).await.unwrap();
    let id = task.id;

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            task.start_processing(Utc::now());
            for kind in StageKind::ORDER.into_iter().take(3) {
                let idx = task.begin_stage(kind, Utc::now()).unwrap();
                store.save(&task).await.unwrap();
                task.finish_stage(idx, Duration::from_millis(1), Ok(()), Utc::now());
                store.save(&task).await.unwrap();
            }
        })
    };

    let mut seen = 0usize;
    while !writer.is_finished() {
        let snapshot = store.get(id).await.unwrap().expect("record vanished");
        snapshot.check_invariants().unwrap();
        assert!(snapshot.stages.len() >= seen, "stages went backwards");
        seen = snapshot.stages.len();
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    assert_eq!(store.get(id).await.unwrap().unwrap().stages.len(), 3);
}
