//! InMemoryTaskStore - per-key store for tests and embedding.
//!
//! Same contract as the file store; nothing survives the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{PipelineError, TaskId, TaskRecord};
use crate::ports::TaskStore;

#[derive(Default)]
struct Inner {
    by_id: HashMap<TaskId, TaskRecord>,
    /// First-save order, for `list`.
    order: Vec<TaskId>,
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: RwLock<Inner>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &TaskRecord) -> Result<(), PipelineError> {
        let mut inner = self.inner.write().await;
        if inner.by_id.insert(task.id, task.clone()).is_none() {
            inner.order.push(task.id);
        }
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, PipelineError> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<TaskRecord>, PipelineError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect())
    }
}
