//! StageRunner - drives one task through the fixed stage sequence.
//!
//! # Stage protocol
//! Identical for every stage:
//! 1. append the stage as `processing` and persist
//! 2. run the stage body
//! 3. set duration and `completed`/`failed` (with the error text), persist
//!
//! A failed stage fails the task and halts the pipeline. The last stage's
//! completion is persisted together with the result, so no snapshot shows
//! four completed stages without one.
//!
//! # Persistence failures
//! The runner never continues on top of progress it could not persist. A
//! failed save finalizes the current stage as failed with the store error,
//! fails the task, and makes one best-effort final save.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::domain::stage::duration_ms;
use crate::domain::{
    AnalysisResult, PipelineError, StageKind, StudyGuide, TaskRecord, TimelineEntry,
};
use crate::pipeline::extract::{self, ExtractedMedia};
use crate::pipeline::grid::{self, GridNaming};
use crate::pipeline::{decode, prompts, CallContext};
use crate::ports::{
    Attachment, Clock, GenerationRequest, GenerativeService, MediaTranscoder, TaskStore,
};

pub const DEFAULT_TRANSCRIBE_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_GUIDE_MODEL: &str = "gemini-1.5-flash";

/// Directories and knobs the stages need.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Where submitted files are stored (`stored_name` is relative to it).
    pub upload_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub frame_interval: Duration,
    pub transcribe_model: String,
    pub guide_model: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            snapshot_dir: PathBuf::from("snapshots"),
            processed_dir: PathBuf::from("processed"),
            frame_interval: Duration::from_secs(5),
            transcribe_model: DEFAULT_TRANSCRIBE_MODEL.to_string(),
            guide_model: DEFAULT_GUIDE_MODEL.to_string(),
        }
    }
}

/// Per-task working paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPaths {
    pub input: PathBuf,
    pub frames_dir: PathBuf,
    pub audio: PathBuf,
    pub grids: GridNaming,
}

impl TaskPaths {
    pub fn new(settings: &PipelineSettings, task: &TaskRecord) -> Self {
        let id = task.id.to_string();
        Self {
            input: settings.upload_dir.join(&task.stored_name),
            frames_dir: settings.snapshot_dir.join(&id),
            audio: settings.processed_dir.join(format!("{id}.mp3")),
            grids: GridNaming::new(&settings.processed_dir, id),
        }
    }
}

/// A stage that ran and whose completion is (or will be) persisted.
struct Finished<T> {
    value: T,
    index: usize,
    elapsed: Duration,
}

pub struct StageRunner {
    store: Arc<dyn TaskStore>,
    transcoder: Arc<dyn MediaTranscoder>,
    generator: Arc<dyn GenerativeService>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
}

impl StageRunner {
    pub fn new(
        store: Arc<dyn TaskStore>,
        transcoder: Arc<dyn MediaTranscoder>,
        generator: Arc<dyn GenerativeService>,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            transcoder,
            generator,
            clock,
            settings,
        }
    }

    /// Run every stage of `task` and return the final record.
    ///
    /// Never returns an error: every failure ends up on the record itself.
    pub async fn run(&self, mut task: TaskRecord, ctx: &CallContext) -> TaskRecord {
        let started = Instant::now();
        let paths = TaskPaths::new(&self.settings, &task);

        task.start_processing(self.clock.now());
        if let Err(err) = self.store.save(&task).await {
            error!(task_id = %task.id, error = %err, "persisting processing state failed");
            task.abandon(err.to_string(), self.clock.now());
            self.save_final(&task).await;
            return task;
        }

        let extraction = extract::extract_media(
            self.transcoder.as_ref(),
            &paths.input,
            &paths.frames_dir,
            &paths.audio,
            self.settings.frame_interval,
            ctx,
        );
        let Some(media) = self
            .stage(&mut task, StageKind::MediaExtraction, extraction, true)
            .await
        else {
            return task;
        };
        let ExtractedMedia { frames, audio } = media.value;
        info!(task_id = %task.id, frames = frames.len(), "media extracted");

        let grids = ctx.run(
            "grid generation",
            grid::compose_grids(frames, paths.grids.clone()),
        );
        let Some(grids) = self
            .stage(&mut task, StageKind::GridGeneration, grids, true)
            .await
        else {
            return task;
        };
        let grids = grids.value;

        let Some(transcript) = self
            .stage(
                &mut task,
                StageKind::Transcription,
                self.transcribe(&audio, ctx),
                true,
            )
            .await
        else {
            return task;
        };
        let transcript = transcript.value;

        // 最終 stage の完了は result と同じ save で書く
        let Some(guide) = self
            .stage(
                &mut task,
                StageKind::StudyGuideGeneration,
                self.write_study_guide(&transcript, &grids, ctx),
                false,
            )
            .await
        else {
            return task;
        };

        let result = AnalysisResult {
            transcription: transcript,
            study_guide: guide.value,
            image_paths: grids.iter().map(|p| p.display().to_string()).collect(),
        };
        task.complete(result, started.elapsed(), self.clock.now());
        if self.persist(&mut task, guide.index, guide.elapsed).await {
            info!(
                task_id = %task.id,
                total_time_ms = task.total_time_ms,
                "task completed"
            );
        }
        task
    }

    /// Fail a task that will never reach a worker and persist it.
    pub async fn abandon(&self, mut task: TaskRecord, reason: &str) -> TaskRecord {
        warn!(task_id = %task.id, reason, "abandoning task");
        task.abandon(reason, self.clock.now());
        self.save_final(&task).await;
        task
    }

    /// One pass of the stage protocol. `None` means the task is now failed
    /// (and persisted as well as the store allows).
    async fn stage<T>(
        &self,
        task: &mut TaskRecord,
        kind: StageKind,
        body: impl Future<Output = Result<T, PipelineError>>,
        persist_completion: bool,
    ) -> Option<Finished<T>> {
        let index = match task.begin_stage(kind, self.clock.now()) {
            Ok(index) => index,
            Err(err) => {
                error!(task_id = %task.id, stage = %kind, error = %err, "stage refused");
                task.abandon(err.to_string(), self.clock.now());
                self.save_final(task).await;
                return None;
            }
        };
        // 開始を保存できなければ本体は走らせない
        if !self.persist(task, index, Duration::ZERO).await {
            return None;
        }
        info!(task_id = %task.id, stage = %kind, "stage started");

        let t0 = Instant::now();
        let outcome = body.await;
        let elapsed = t0.elapsed();

        match outcome {
            Ok(value) => {
                task.finish_stage(index, elapsed, Ok(()), self.clock.now());
                info!(
                    task_id = %task.id,
                    stage = %kind,
                    duration_ms = duration_ms(elapsed),
                    "stage completed"
                );
                if persist_completion && !self.persist(task, index, elapsed).await {
                    return None;
                }
                Some(Finished {
                    value,
                    index,
                    elapsed,
                })
            }
            Err(err) => {
                warn!(
                    task_id = %task.id,
                    stage = %kind,
                    duration_ms = duration_ms(elapsed),
                    error = %err,
                    "stage failed"
                );
                task.finish_stage(index, elapsed, Err(err.to_string()), self.clock.now());
                self.save_final(task).await;
                None
            }
        }
    }

    /// Save `task`; on failure fail the stage at `index` and try once more.
    async fn persist(&self, task: &mut TaskRecord, index: usize, elapsed: Duration) -> bool {
        match self.store.save(task).await {
            Ok(()) => true,
            Err(err) => {
                error!(task_id = %task.id, error = %err, "persisting stage transition failed");
                task.finish_stage(index, elapsed, Err(err.to_string()), self.clock.now());
                self.save_final(task).await;
                false
            }
        }
    }

    async fn save_final(&self, task: &TaskRecord) {
        if let Err(err) = self.store.save(task).await {
            error!(
                task_id = %task.id,
                status = %task.status,
                error = %err,
                "final save failed; stored status is stale"
            );
        }
    }

    async fn transcribe(
        &self,
        audio: &Path,
        ctx: &CallContext,
    ) -> Result<Vec<TimelineEntry>, PipelineError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| PipelineError::io(audio, e))?;
        let request = GenerationRequest {
            model: self.settings.transcribe_model.clone(),
            prompt: prompts::TRANSCRIPTION.to_string(),
            attachments: vec![Attachment::new("audio/mpeg", bytes)],
        };
        let raw = self.generator.generate(request, ctx).await?;
        decode::parse_json("transcription", &raw)
    }

    async fn write_study_guide(
        &self,
        transcript: &[TimelineEntry],
        grids: &[PathBuf],
        ctx: &CallContext,
    ) -> Result<StudyGuide, PipelineError> {
        let transcript_json = serde_json::to_string(transcript)
            .map_err(|e| PipelineError::Stage(format!("encoding transcript: {e}")))?;

        let mut attachments = Vec::with_capacity(grids.len());
        for grid in grids {
            let bytes = tokio::fs::read(grid)
                .await
                .map_err(|e| PipelineError::io(grid, e))?;
            attachments.push(Attachment::new("image/jpeg", bytes));
        }

        let request = GenerationRequest {
            model: self.settings.guide_model.clone(),
            prompt: prompts::study_guide(&transcript_json, grids.len()),
            attachments,
        };
        let raw = self.generator.generate(request, ctx).await?;
        decode::parse_json("study guide", &raw)
    }
}
