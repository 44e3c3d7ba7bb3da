//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use scrapify_core::domain::{PipelineError, TaskId, TaskRecord};
use scrapify_core::impls::InMemoryTaskStore;
use scrapify_core::pipeline::runner::{DEFAULT_GUIDE_MODEL, DEFAULT_TRANSCRIBE_MODEL};
use scrapify_core::pipeline::{CallContext, PipelineSettings, StageRunner};
use scrapify_core::ports::{
    GenerationRequest, GenerativeService, MediaTranscoder, SystemClock, TaskStore,
};

pub const TRANSCRIPT: &str = r#"```json
[{"timestamp": "00:00", "event": "Welcome"}, {"timestamp": "00:05", "event": "Ownership"}]
```"#;

pub const GUIDE: &str = r#"```json
{"title": "Rust Ownership", "summary": "Moves and borrows.",
 "key_points": ["one owner"], "glossary": [{"move": "transfer of ownership"}],
 "timeline": [{"timestamp": "00:05", "event": "Ownership"}],
 "visual_analysis": [{"grid_index": 1, "item_index": 2, "timestamp": "00:05", "explanation": "slide"}],
 "external_resources": [], "quiz": [{"question": "How many owners?", "options": ["1", "2"], "answer": "1"}]}
```"#;

/// Writes `frames` small JPEGs and a dummy MP3, optionally failing a branch.
pub struct FakeTranscoder {
    pub frames: usize,
    pub fail_frames: Option<String>,
    pub fail_audio: Option<String>,
    pub delay: Duration,
    pub audio_calls: AtomicUsize,
    pub audio_completed: AtomicUsize,
}

impl FakeTranscoder {
    pub fn with_frames(frames: usize) -> Self {
        Self {
            frames,
            fail_frames: None,
            fail_audio: None,
            delay: Duration::ZERO,
            audio_calls: AtomicUsize::new(0),
            audio_completed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaTranscoder for FakeTranscoder {
    async fn sample_frames(
        &self,
        _input: &Path,
        out_dir: &Path,
        _interval: Duration,
        ctx: &CallContext,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        ctx.run("frame sampling", async {
            tokio::time::sleep(self.delay).await;
            if let Some(message) = &self.fail_frames {
                return Err(PipelineError::tool("ffmpeg snapshots", message.clone()));
            }
            std::fs::create_dir_all(out_dir).map_err(|e| PipelineError::io(out_dir, e))?;
            let mut frames = Vec::with_capacity(self.frames);
            for i in 1..=self.frames {
                let path = out_dir.join(format!("thumb{i:03}.jpg"));
                let shade = (i * 5 % 256) as u8;
                RgbImage::from_pixel(40, 24, Rgb([shade, 0, 255 - shade]))
                    .save(&path)
                    .map_err(|e| PipelineError::Image {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                frames.push(path);
            }
            Ok::<_, PipelineError>(frames)
        })
        .await
    }

    async fn extract_audio(
        &self,
        _input: &Path,
        output: &Path,
        ctx: &CallContext,
    ) -> Result<(), PipelineError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        ctx.run("audio extraction", async {
            tokio::time::sleep(self.delay + Duration::from_millis(10)).await;
            self.audio_completed.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.fail_audio {
                return Err(PipelineError::tool("ffmpeg audio extraction", message.clone()));
            }
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
            }
            std::fs::write(output, b"ID3").map_err(|e| PipelineError::io(output, e))
        })
        .await
    }
}

/// Answers by model name; records every request.
pub struct FakeGenerator {
    pub transcript: Result<String, String>,
    pub guide: Result<String, String>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn ok() -> Self {
        Self {
            transcript: Ok(TRANSCRIPT.to_string()),
            guide: Ok(GUIDE.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeService for FakeGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        ctx: &CallContext,
    ) -> Result<String, PipelineError> {
        let answer = if request.model == DEFAULT_TRANSCRIBE_MODEL {
            self.transcript.clone()
        } else {
            assert_eq!(request.model, DEFAULT_GUIDE_MODEL);
            self.guide.clone()
        };
        self.requests.lock().unwrap().push(request);
        ctx.run("generative call", async {
            answer.map_err(PipelineError::ExternalService)
        })
        .await
    }
}

/// In-memory store that keeps every saved snapshot and checks record
/// invariants on each save.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryTaskStore,
    pub snapshots: Mutex<Vec<TaskRecord>>,
}

impl RecordingStore {
    pub fn snapshots_of(&self, id: TaskId) -> Vec<TaskRecord> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TaskStore for RecordingStore {
    async fn save(&self, task: &TaskRecord) -> Result<(), PipelineError> {
        if let Err(violation) = task.check_invariants() {
            panic!("saved inconsistent record {}: {violation}", task.id);
        }
        self.snapshots.lock().unwrap().push(task.clone());
        self.inner.save(task).await
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, PipelineError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<TaskRecord>, PipelineError> {
        self.inner.list().await
    }
}

pub fn settings(root: &Path) -> PipelineSettings {
    PipelineSettings {
        upload_dir: root.join("uploads"),
        snapshot_dir: root.join("snapshots"),
        processed_dir: root.join("processed"),
        ..PipelineSettings::default()
    }
}

pub fn runner(
    root: &Path,
    store: Arc<dyn TaskStore>,
    transcoder: Arc<dyn MediaTranscoder>,
    generator: Arc<dyn GenerativeService>,
) -> StageRunner {
    StageRunner::new(
        store,
        transcoder,
        generator,
        Arc::new(SystemClock),
        settings(root),
    )
}
