//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::PipelineError;

/// Carried into every external call (transcoder, generative service).
///
/// - `cancel` is normally the worker pool's shutdown token, so an aborting
///   pool interrupts in-flight calls.
/// - `timeout` bounds a single call; `None` waits indefinitely.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl CallContext {
    pub fn new(cancel: CancellationToken, timeout: Option<Duration>) -> Self {
        Self { cancel, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drive `fut` to completion unless the token fires or the deadline passes.
    ///
    /// Losing the race drops `fut`, so adapters must clean up on drop
    /// (the ffmpeg adapter spawns with `kill_on_drop`).
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled(what.to_string()));
        }

        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                    PipelineError::TimedOut {
                        operation: what.to_string(),
                        timeout: limit,
                    }
                })?,
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled(what.to_string())),
            res = bounded => res,
        }
    }
}
