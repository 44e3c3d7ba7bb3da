//! Errors and their operational classification.

use std::path::PathBuf;
use std::time::Duration;

/// ErrorKind groups errors by who is at fault.
///
/// - ExternalTool: the transcoder invocation failed
/// - ExternalService: the generative call failed or returned unusable content
/// - Persistence: the status store could not be read or written
/// - Validation: the submission itself was malformed
/// - Stage: local processing inside a stage (file I/O, image decode)
/// - Interrupted: the call was cancelled or exceeded its deadline
/// - Closed: the worker pool no longer accepts work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ExternalTool,
    ExternalService,
    Persistence,
    Validation,
    Stage,
    Interrupted,
    Closed,
}

/// Every error the pipeline can surface.
///
/// The `Display` text is what ends up in a failed stage's `error` field, so
/// it is written for a human reading a status poll.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("generative service error: {0}")]
    ExternalService(String),

    #[error("failed to parse {what} JSON: {reason}, content: {content}")]
    MalformedResponse {
        what: &'static str,
        reason: String,
        content: String,
    },

    #[error("status store error: {0}")]
    Persistence(String),

    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to process image {}: {message}", path.display())]
    Image { path: PathBuf, message: String },

    #[error("{0}")]
    Stage(String),

    #[error("{0} cancelled")]
    Cancelled(String),

    #[error("{operation} timed out after {timeout:?}")]
    TimedOut { operation: String, timeout: Duration },

    #[error("worker pool is shut down")]
    PoolClosed,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::ExternalTool { .. } => ErrorKind::ExternalTool,
            PipelineError::ExternalService(_) | PipelineError::MalformedResponse { .. } => {
                ErrorKind::ExternalService
            }
            PipelineError::Persistence(_) => ErrorKind::Persistence,
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Io { .. } | PipelineError::Image { .. } | PipelineError::Stage(_) => {
                ErrorKind::Stage
            }
            PipelineError::Cancelled(_) | PipelineError::TimedOut { .. } => ErrorKind::Interrupted,
            PipelineError::PoolClosed => ErrorKind::Closed,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
