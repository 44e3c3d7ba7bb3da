//! FfmpegTranscoder - MediaTranscoder backed by the `ffmpeg` binary.
//!
//! Each call spawns one process via `tokio::process` with `kill_on_drop`, so
//! a call abandoned by [`CallContext`] (cancel or timeout) takes its child
//! process down with it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::PipelineError;
use crate::pipeline::CallContext;
use crate::ports::MediaTranscoder;

/// Frame file pattern inside the per-task snapshot directory.
pub const FRAME_PATTERN: &str = "thumb%03d.jpg";

/// How many trailing stderr lines end up in an error message.
const STDERR_TAIL_LINES: usize = 8;

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn exec(&self, what: &'static str, args: Vec<OsString>) -> Result<(), PipelineError> {
        debug!(binary = %self.binary.display(), ?args, "spawning ffmpeg");
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                PipelineError::tool(what, format!("spawning {}: {e}", self.binary.display()))
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr_tail(&stderr);
        let message = if tail.is_empty() {
            output.status.to_string()
        } else {
            format!("{}: {tail}", output.status)
        };
        Err(PipelineError::tool(what, message))
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn sample_frames(
        &self,
        input: &Path,
        out_dir: &Path,
        interval: Duration,
        ctx: &CallContext,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        if interval.is_zero() {
            return Err(PipelineError::tool(
                "ffmpeg snapshots",
                "frame interval must be positive",
            ));
        }
        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| PipelineError::io(out_dir, e))?;

        let args = snapshot_args(input, out_dir, interval);
        ctx.run("frame sampling", self.exec("ffmpeg snapshots", args))
            .await?;
        list_frames(out_dir).await
    }

    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        ctx: &CallContext,
    ) -> Result<(), PipelineError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io(parent, e))?;
        }
        let args = audio_args(input, output);
        ctx.run(
            "audio extraction",
            self.exec("ffmpeg audio extraction", args),
        )
        .await
    }
}

fn snapshot_args(input: &Path, out_dir: &Path, interval: Duration) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-y".into(),
        "-i".into(),
        input.into(),
        "-vf".into(),
        format!("fps=1/{}", interval.as_secs_f64()).into(),
        out_dir.join(FRAME_PATTERN).into(),
    ]
}

fn audio_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-y".into(),
        "-i".into(),
        input.into(),
        "-vn".into(),
        "-acodec".into(),
        "libmp3lame".into(),
        output.into(),
    ]
}

/// `.jpg` files directly under `dir`, in capture order.
///
/// ffmpeg widens `%03d` past 999 (`thumb1000.jpg`), so frames are ordered by
/// their numeric suffix rather than by name.
async fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;

    let mut frames = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| PipelineError::io(&path, e))?
            .is_file();
        if is_file && path.extension().is_some_and(|ext| ext == "jpg") {
            frames.push(path);
        }
    }
    frames.sort_by(|a, b| {
        frame_number(a)
            .cmp(&frame_number(b))
            .then_with(|| a.cmp(b))
    });
    Ok(frames)
}

/// Trailing digits of the file stem; `None` sorts before any number.
fn frame_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    stem[prefix.len()..].parse().ok()
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
