//! Derived document model: transcript, study guide and the final result.
//!
//! Field names follow the JSON the generative service is prompted to emit,
//! so these types double as the parse targets for its responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One timestamped line of a transcript or of a study-guide timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// `MM:SS` as produced by the service; kept verbatim.
    pub timestamp: String,
    pub event: String,
}

impl TimelineEntry {
    pub fn new(timestamp: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            event: event.into(),
        }
    }
}

/// A visual annotation pointing at one tile of one grid image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualNote {
    pub grid_index: u32,
    pub item_index: u32,
    #[serde(default)]
    pub timestamp: String,
    pub explanation: String,
}

/// Further reading suggested by the guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResource {
    /// "video", "article", "documentation", ...
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub answer: String,
}

/// The structured document produced by the study-guide stage.
///
/// Every field defaults to empty, so a terser response from the service
/// still parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyGuide {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Each entry maps a term to its definition.
    #[serde(default)]
    pub glossary: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub visual_analysis: Vec<VisualNote>,
    #[serde(default)]
    pub external_resources: Vec<ExternalResource>,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

/// Everything a completed task exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub transcription: Vec<TimelineEntry>,
    pub study_guide: StudyGuide,
    /// Grid images in batch order; never empty for a completed task.
    pub image_paths: Vec<String>,
}

impl AnalysisResult {
    /// The designated primary grid (the first batch).
    pub fn primary_image(&self) -> Option<&str> {
        self.image_paths.first().map(String::as_str)
    }
}
