//! Media Extraction: frame sampling and audio transcoding as one fork-join.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::PipelineError;
use crate::pipeline::CallContext;
use crate::ports::MediaTranscoder;

/// Output of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    /// Sorted frame paths.
    pub frames: Vec<PathBuf>,
    pub audio: PathBuf,
}

/// Run both sub-operations concurrently and wait for both.
///
/// Neither branch is cancelled when the other fails. If both fail, the
/// frames error comes first in the combined message.
pub async fn extract_media(
    transcoder: &dyn MediaTranscoder,
    input: &Path,
    frames_dir: &Path,
    audio: &Path,
    interval: Duration,
    ctx: &CallContext,
) -> Result<ExtractedMedia, PipelineError> {
    let (frames, audio_result) = tokio::join!(
        transcoder.sample_frames(input, frames_dir, interval, ctx),
        transcoder.extract_audio(input, audio, ctx),
    );

    match (frames, audio_result) {
        (Ok(frames), Ok(())) => Ok(ExtractedMedia {
            frames,
            audio: audio.to_path_buf(),
        }),
        (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
        (Err(frames_err), Err(audio_err)) => {
            Err(PipelineError::Stage(format!("{frames_err}; {audio_err}")))
        }
    }
}
