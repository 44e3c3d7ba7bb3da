//! MediaTranscoder port - the external transcoding tool.
//!
//! Both operations are black boxes: they either produce files or fail with
//! the tool's message.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::PipelineError;
use crate::pipeline::CallContext;

#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Sample one frame every `interval` from `input` into `out_dir`.
    ///
    /// Returns the produced image paths in capture order.
    async fn sample_frames(
        &self,
        input: &Path,
        out_dir: &Path,
        interval: Duration,
        ctx: &CallContext,
    ) -> Result<Vec<PathBuf>, PipelineError>;

    /// Transcode the audio track of `input` to `output` (MP3).
    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        ctx: &CallContext,
    ) -> Result<(), PipelineError>;
}
