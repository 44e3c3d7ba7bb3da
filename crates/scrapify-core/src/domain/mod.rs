//! Domain model (ids, status, task and stage records, derived documents, errors).

pub mod errors;
pub mod guide;
pub mod ids;
pub mod record;
pub mod stage;
pub mod status;

pub use errors::{ErrorKind, PipelineError};
pub use guide::{
    AnalysisResult, ExternalResource, QuizQuestion, StudyGuide, TimelineEntry, VisualNote,
};
pub use ids::{Id, IdMarker, ParseIdError, TaskId};
pub use record::TaskRecord;
pub use stage::{StageKind, StageRecord};
pub use status::TaskStatus;
