//! Application configuration, loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::runner::{DEFAULT_GUIDE_MODEL, DEFAULT_TRANSCRIBE_MODEL};
use crate::pipeline::PipelineSettings;

/// Runtime configuration.
///
/// Every field has a default, so only `GEMINI_API_KEY` has to be set to
/// process media.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Status Store file (default: `tasks.json`).
    pub status_file: PathBuf,
    pub upload_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub processed_dir: PathBuf,

    /// Number of workers (default: 2).
    pub workers: usize,
    /// Queue bound; `enqueue` waits once it is reached (default: 100).
    pub queue_capacity: usize,

    /// Frame sampling interval (default: 5s).
    pub frame_interval: Duration,
    /// Per external call; `None` waits indefinitely.
    pub call_timeout: Option<Duration>,

    pub ffmpeg_binary: PathBuf,
    pub gemini_api_key: Option<String>,
    pub transcribe_model: String,
    pub guide_model: String,

    /// `tracing` filter string, e.g. `"info"` or `"scrapify_core=debug"`.
    pub log_level: String,
    /// Emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    /// Build [`AppConfig`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        Self {
            status_file: env_or("SCRAPIFY_STATUS_FILE", "tasks.json").into(),
            upload_dir: env_or("SCRAPIFY_UPLOAD_DIR", "uploads").into(),
            snapshot_dir: env_or("SCRAPIFY_SNAPSHOT_DIR", "snapshots").into(),
            processed_dir: env_or("SCRAPIFY_PROCESSED_DIR", "processed").into(),
            workers: parse_env(&lookup, "SCRAPIFY_WORKERS", 2),
            queue_capacity: parse_env(&lookup, "SCRAPIFY_QUEUE_CAPACITY", 100),
            frame_interval: Duration::from_secs(parse_env(
                &lookup,
                "SCRAPIFY_FRAME_INTERVAL_SECS",
                5,
            )),
            call_timeout: lookup("SCRAPIFY_CALL_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            ffmpeg_binary: env_or("SCRAPIFY_FFMPEG", "ffmpeg").into(),
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()),
            transcribe_model: env_or("SCRAPIFY_TRANSCRIBE_MODEL", DEFAULT_TRANSCRIBE_MODEL),
            guide_model: env_or("SCRAPIFY_GUIDE_MODEL", DEFAULT_GUIDE_MODEL),
            log_level: env_or("SCRAPIFY_LOG", "info"),
            log_json: lookup("SCRAPIFY_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            upload_dir: self.upload_dir.clone(),
            snapshot_dir: self.snapshot_dir.clone(),
            processed_dir: self.processed_dir.clone(),
            frame_interval: self.frame_interval,
            transcribe_model: self.transcribe_model.clone(),
            guide_model: self.guide_model.clone(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
