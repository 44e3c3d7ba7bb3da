//! AppBuilder - wiring ports, runner and pool into an [`App`].
//!
//! # Fail-fast
//! `build()` validates the configuration and opens the Status Store, so a
//! misconfigured process stops before accepting any submission.
//!
//! Every port has a production default (JSON file store, ffmpeg, Gemini,
//! system clock); tests swap any of them with the `with_*` methods.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::app::config::AppConfig;
use crate::app::dispatcher::{ShutdownMode, WorkerPool};
use crate::app::status::StatusCounts;
use crate::domain::{PipelineError, TaskId, TaskRecord};
use crate::impls::{FfmpegTranscoder, GeminiClient, JsonFileTaskStore};
use crate::pipeline::StageRunner;
use crate::ports::{
    Clock, GenerativeService, IdGenerator, MediaTranscoder, SystemClock, TaskStore, UlidGenerator,
};

/// BuildError is returned when the application cannot be assembled.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("GEMINI_API_KEY is not set and no generative service was provided")]
    MissingApiKey,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to open status store: {0}")]
    Store(#[source] PipelineError),
}

pub struct AppBuilder {
    config: AppConfig,
    store: Option<Arc<dyn TaskStore>>,
    transcoder: Option<Arc<dyn MediaTranscoder>>,
    generator: Option<Arc<dyn GenerativeService>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: None,
            transcoder: None,
            generator: None,
            clock: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn MediaTranscoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn GenerativeService>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub async fn build(self) -> Result<App, BuildError> {
        let config = self.config;
        if config.workers == 0 {
            return Err(BuildError::InvalidConfig("worker count must be at least 1".into()));
        }
        if config.queue_capacity == 0 {
            return Err(BuildError::InvalidConfig("queue capacity must be at least 1".into()));
        }
        if config.frame_interval.is_zero() {
            return Err(BuildError::InvalidConfig("frame interval must be positive".into()));
        }

        let generator: Arc<dyn GenerativeService> = match self.generator {
            Some(generator) => generator,
            None => {
                let key = config.gemini_api_key.clone().ok_or(BuildError::MissingApiKey)?;
                Arc::new(GeminiClient::new(key))
            }
        };
        let store: Arc<dyn TaskStore> = match self.store {
            Some(store) => store,
            None => {
                let store = JsonFileTaskStore::open(&config.status_file)
                    .await
                    .map_err(BuildError::Store)?;
                info!(path = %store.path().display(), "status store opened");
                Arc::new(store)
            }
        };
        let transcoder = self
            .transcoder
            .unwrap_or_else(|| Arc::new(FfmpegTranscoder::new(&config.ffmpeg_binary)));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let runner = Arc::new(StageRunner::new(
            Arc::clone(&store),
            transcoder,
            generator,
            Arc::clone(&clock),
            config.pipeline_settings(),
        ));
        let pool = WorkerPool::new(
            Arc::clone(&runner),
            config.queue_capacity,
            config.call_timeout,
        );
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));

        Ok(App {
            config,
            store,
            runner,
            pool,
            ids,
            clock,
        })
    }
}

/// A running pipeline: submit files, poll their status, shut down.
pub struct App {
    config: AppConfig,
    store: Arc<dyn TaskStore>,
    runner: Arc<StageRunner>,
    pool: WorkerPool,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl App {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Launch the configured number of workers.
    pub fn start(&self) {
        self.pool.start(self.config.workers);
        info!(workers = self.pool.worker_count(), "workers started");
    }

    /// Store `source` under the upload directory, persist a pending task and
    /// queue it. Returns the poll handle.
    pub async fn submit(&self, source: &Path) -> Result<TaskId, PipelineError> {
        let meta = tokio::fs::metadata(source).await.map_err(|e| {
            PipelineError::Validation(format!("cannot read {}: {e}", source.display()))
        })?;
        if !meta.is_file() {
            return Err(PipelineError::Validation(format!(
                "{} is not a regular file",
                source.display()
            )));
        }
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::Validation(format!("{} has no file name", source.display()))
            })?;

        let id = self.ids.generate_task_id();
        let stored_name = match source.extension() {
            Some(ext) => format!("{id}.{}", ext.to_string_lossy()),
            None => id.to_string(),
        };
        let upload_dir = &self.config.upload_dir;
        tokio::fs::create_dir_all(upload_dir)
            .await
            .map_err(|e| PipelineError::io(upload_dir, e))?;
        let stored_path = upload_dir.join(&stored_name);
        tokio::fs::copy(source, &stored_path)
            .await
            .map_err(|e| PipelineError::io(&stored_path, e))?;

        let task = TaskRecord::new(id, original_name, stored_name, self.clock.now());
        self.store.save(&task).await?;
        info!(task_id = %id, original_name = %task.original_name, "task submitted");

        if let Err(err) = self.pool.enqueue(task.clone()).await {
            self.runner.abandon(task, &err.to_string()).await;
            return Err(err);
        }
        Ok(id)
    }

    /// Current record, `None` if the id is unknown.
    pub async fn status(&self, id: TaskId) -> Result<Option<TaskRecord>, PipelineError> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<TaskRecord>, PipelineError> {
        self.store.list().await
    }

    pub async fn counts(&self) -> Result<StatusCounts, PipelineError> {
        let records = self.store.list().await?;
        Ok(StatusCounts::from_records(&records))
    }

    pub async fn shutdown(&self, mode: ShutdownMode) {
        self.pool.shutdown(mode).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryTaskStore;

    #[tokio::test]
    async fn build_without_api_key_or_generator_fails() {
        let result = AppBuilder::new(AppConfig::default())
            .with_store(Arc::new(InMemoryTaskStore::new()))
            .build()
            .await;
        assert!(matches!(result, Err(BuildError::MissingApiKey)));
    }

    #[tokio::test]
    async fn build_rejects_zero_workers() {
        let config = AppConfig {
            workers: 0,
            ..AppConfig::default()
        };
        let result = AppBuilder::new(config).build().await;
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn build_with_api_key_opens_json_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            status_file: dir.path().join("tasks.json"),
            gemini_api_key: Some("test-key".into()),
            ..AppConfig::default()
        };
        let app = AppBuilder::new(config).build().await.unwrap();
        assert!(app.list().await.unwrap().is_empty());
        assert!(dir.path().join("tasks.json").exists());
    }

    #[tokio::test]
    async fn start_spawns_configured_workers_and_shutdown_joins_them() {
        let config = AppConfig {
            workers: 3,
            gemini_api_key: Some("test-key".into()),
            ..AppConfig::default()
        };
        let app = AppBuilder::new(config)
            .with_store(Arc::new(InMemoryTaskStore::new()))
            .build()
            .await
            .unwrap();

        app.start();
        assert_eq!(app.pool.worker_count(), 3);

        app.shutdown(ShutdownMode::Drain).await;
        assert_eq!(app.pool.worker_count(), 0);
    }
}
