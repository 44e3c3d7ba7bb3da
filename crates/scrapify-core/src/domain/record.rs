//! Task record: the persisted unit of work and its progress.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::PipelineError;
use super::guide::AnalysisResult;
use super::ids::TaskId;
use super::stage::{StageKind, StageRecord, duration_ms};
use super::status::TaskStatus;

/// Everything a poller can see about one submission.
///
/// Design:
/// - This is the single source of truth for a task's progress.
/// - All state transitions go through the methods below. The invariants in
///   [`TaskRecord::check_invariants`] hold at every persisted point; the one
///   transient gap (last stage completed, result not yet attached) is never
///   saved.
/// - Every transition takes `now` explicitly and bumps `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub original_name: String,
    pub stored_name: String,
    pub status: TaskStatus,

    /// Append-only, chronological.
    #[serde(default)]
    pub stages: Vec<StageRecord>,

    /// Time from processing start to completion.
    #[serde(default)]
    pub total_time_ms: u64,

    /// Present iff `status` is completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        original_name: impl Into<String>,
        stored_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            original_name: original_name.into(),
            stored_name: stored_name.into(),
            status: TaskStatus::Pending,
            stages: Vec::new(),
            total_time_ms: 0,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at).max(self.updated_at);
    }

    /// Mark as picked up by a worker.
    pub fn start_processing(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Processing;
        self.touch(now);
    }

    /// Append a stage in `processing` state and return its index.
    ///
    /// Refuses to append once the task is terminal, which is what keeps a
    /// failed stage the last one in the sequence.
    pub fn begin_stage(
        &mut self,
        kind: StageKind,
        now: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        if self.status.is_terminal() {
            return Err(PipelineError::Stage(format!(
                "cannot start stage '{kind}' on a {} task",
                self.status
            )));
        }
        if self.stages.last().is_some_and(|s| !s.status.is_terminal()) {
            return Err(PipelineError::Stage(format!(
                "cannot start stage '{kind}' while another stage is running"
            )));
        }
        self.stages.push(StageRecord::started(kind, now));
        self.touch(now);
        Ok(self.stages.len() - 1)
    }

    /// Finalize the stage at `index`. A failure fails the whole task.
    pub fn finish_stage(
        &mut self,
        index: usize,
        elapsed: Duration,
        outcome: Result<(), String>,
        now: DateTime<Utc>,
    ) {
        let Some(stage) = self.stages.get_mut(index) else {
            return;
        };
        match outcome {
            Ok(()) => stage.mark_completed(elapsed),
            Err(error) => {
                stage.mark_failed(elapsed, error);
                self.status = TaskStatus::Failed;
                self.result = None;
            }
        }
        self.touch(now);
    }

    /// Attach the result after the last stage completed.
    pub fn complete(&mut self, result: AnalysisResult, total: Duration, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.total_time_ms = duration_ms(total);
        self.result = Some(result);
        self.touch(now);
    }

    /// Fail a task that will never run its remaining stages.
    ///
    /// A running stage is failed in place; otherwise the next stage in order
    /// is recorded as failed with zero duration so the reason stays visible
    /// to pollers.
    pub fn abandon(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        let reason = reason.into();
        match self.stages.last_mut() {
            Some(stage) if !stage.status.is_terminal() => {
                let elapsed = (now - stage.start_time).to_std().unwrap_or_default();
                stage.mark_failed(elapsed, reason);
            }
            _ => {
                let kind = self.next_stage().unwrap_or(StageKind::MediaExtraction);
                let mut stage = StageRecord::started(kind, now);
                stage.mark_failed(Duration::ZERO, reason);
                self.stages.push(stage);
            }
        }
        self.status = TaskStatus::Failed;
        self.result = None;
        self.touch(now);
    }

    /// The stage that would run next, if any remain.
    pub fn next_stage(&self) -> Option<StageKind> {
        let done = self.stages.len();
        StageKind::ORDER.get(done).copied()
    }

    /// The failed stage's error, if the task failed.
    pub fn error(&self) -> Option<&str> {
        self.stages.iter().find_map(|s| s.error.as_deref())
    }

    /// Check the record-level invariants; returns the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.updated_at < self.created_at {
            return Err("updated_at precedes created_at".into());
        }

        let completed = self.status == TaskStatus::Completed;
        let has_result = self.result.is_some();
        let all_stages_completed = self.stages.len() == StageKind::ORDER.len()
            && self.stages.iter().all(|s| s.status == TaskStatus::Completed);
        if completed != has_result || completed != all_stages_completed {
            return Err(format!(
                "status={} result_present={has_result} all_stages_completed={all_stages_completed}",
                self.status
            ));
        }

        if let Some(pos) = self
            .stages
            .iter()
            .position(|s| s.status == TaskStatus::Failed)
        {
            if pos + 1 != self.stages.len() {
                return Err(format!("stage appended after failed stage #{pos}"));
            }
            if self.status != TaskStatus::Failed {
                return Err(format!("failed stage but task is {}", self.status));
            }
        }

        for stage in &self.stages {
            if stage.error.is_some() != (stage.status == TaskStatus::Failed) {
                return Err(format!("stage '{}' error/status mismatch", stage.name));
            }
        }

        for (stage, expected) in self.stages.iter().zip(StageKind::ORDER) {
            if stage.name != expected {
                return Err(format!("stage '{}' out of order", stage.name));
            }
        }

        Ok(())
    }
}
