//! Stage records: one named phase of a task's processing.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::TaskStatus;

/// The fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    #[serde(rename = "Media Extraction")]
    MediaExtraction,
    #[serde(rename = "Grid Generation")]
    GridGeneration,
    #[serde(rename = "Transcription")]
    Transcription,
    #[serde(rename = "Study Guide Generation")]
    StudyGuideGeneration,
}

impl StageKind {
    pub const ORDER: [StageKind; 4] = [
        StageKind::MediaExtraction,
        StageKind::GridGeneration,
        StageKind::Transcription,
        StageKind::StudyGuideGeneration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::MediaExtraction => "Media Extraction",
            StageKind::GridGeneration => "Grid Generation",
            StageKind::Transcription => "Transcription",
            StageKind::StudyGuideGeneration => "Study Guide Generation",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: StageKind,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
    /// Present iff `status` is failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    /// A freshly started stage.
    pub fn started(name: StageKind, start_time: DateTime<Utc>) -> Self {
        Self {
            name,
            status: TaskStatus::Processing,
            start_time,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn mark_completed(&mut self, elapsed: Duration) {
        self.status = TaskStatus::Completed;
        self.duration_ms = duration_ms(elapsed);
        self.error = None;
    }

    pub fn mark_failed(&mut self, elapsed: Duration, error: String) {
        self.status = TaskStatus::Failed;
        self.duration_ms = duration_ms(elapsed);
        self.error = Some(error);
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
