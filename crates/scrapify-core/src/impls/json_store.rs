//! JsonFileTaskStore - the file-backed Status Store.
//!
//! # Layout
//! One JSON array of task records, pretty printed, rewritten in full on
//! every save.
//!
//! # Concurrency
//! - A single `RwLock` covers the whole file: `save` is a read-modify-write
//!   under the write lock, `get`/`list` read under the read lock.
//! - Writes land in a sibling `*.tmp` file that is renamed over the target,
//!   so even an out-of-process reader never sees a half-written array.
//! - Lookup is a linear scan; the file is expected to stay small.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{PipelineError, TaskId, TaskRecord};
use crate::ports::TaskStore;

pub struct JsonFileTaskStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileTaskStore {
    /// Open the store at `path`, creating the file as `[]` if it is missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence("creating directory for", &path, e))?;
        }
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| persistence("checking", &path, e))?;
        if !exists {
            tokio::fs::write(&path, b"[]")
                .await
                .map_err(|e| persistence("initialising", &path, e))?;
        }
        Ok(Self {
            path,
            lock: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<TaskRecord>, PipelineError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| persistence("reading", &self.path, e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::Persistence(format!("decoding {}: {e}", self.path.display()))
        })
    }

    async fn write_all(&self, tasks: &[TaskRecord]) -> Result<(), PipelineError> {
        let bytes = serde_json::to_vec_pretty(tasks)
            .map_err(|e| PipelineError::Persistence(format!("encoding tasks: {e}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| persistence("writing", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| persistence("replacing", &self.path, e))
    }
}

fn persistence(action: &str, path: &Path, err: std::io::Error) -> PipelineError {
    PipelineError::Persistence(format!("{action} {}: {err}", path.display()))
}

#[async_trait]
impl TaskStore for JsonFileTaskStore {
    async fn save(&self, task: &TaskRecord) -> Result<(), PipelineError> {
        let _guard = self.lock.write().await;

        let mut tasks = self.read_all().await?;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }
        self.write_all(&tasks).await
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, PipelineError> {
        let _guard = self.lock.read().await;
        let tasks = self.read_all().await?;
        Ok(tasks.into_iter().find(|t| t.id == id))
    }

    async fn list(&self) -> Result<Vec<TaskRecord>, PipelineError> {
        let _guard = self.lock.read().await;
        self.read_all().await
    }
}
