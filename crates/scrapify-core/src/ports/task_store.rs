//! TaskStore port - the Status Store.
//!
//! The store is the only state shared between workers, and therefore the
//! pipeline's serialization point.
//!
//! # Contract
//! - `save` is an upsert keyed by task id: replace if present, append if not.
//! - `get` returns `Ok(None)` for an unknown id; only I/O and decode problems
//!   are errors.
//! - A reader never observes a partially written record: every `get` returns
//!   a full snapshot as of some completed `save`.

use async_trait::async_trait;

use crate::domain::{PipelineError, TaskId, TaskRecord};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Upsert the full record.
    async fn save(&self, task: &TaskRecord) -> Result<(), PipelineError>;

    /// Current record for `id`, or `None` if it was never saved.
    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, PipelineError>;

    /// Every stored record, in first-saved order.
    async fn list(&self) -> Result<Vec<TaskRecord>, PipelineError>;
}
