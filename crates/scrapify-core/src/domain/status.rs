//! Status shared by tasks and stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress status of a task or of one of its stages.
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Failed
///
/// Stages are created directly in `Processing`; only tasks sit in `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Persisted at submission, waiting for a worker.
    Pending,

    /// Owned by a worker and running stages.
    Processing,

    /// Every stage completed and the result is attached.
    Completed,

    /// A stage failed; the pipeline halted.
    Failed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(TaskStatus::Pending, "\"pending\"")]
    #[case::processing(TaskStatus::Processing, "\"processing\"")]
    #[case::completed(TaskStatus::Completed, "\"completed\"")]
    #[case::failed(TaskStatus::Failed, "\"failed\"")]
    fn serializes_as_lowercase(#[case] status: TaskStatus, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&status).unwrap(), expected);
        assert_eq!(format!("\"{status}\""), expected);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }
}
