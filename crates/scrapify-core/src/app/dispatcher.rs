//! WorkerPool - bounded queue plus a fixed set of workers.
//!
//! # Design
//! - The queue is a bounded `mpsc` channel; `enqueue` awaits while it is full,
//!   which is the only backpressure.
//! - Workers share the receiver behind a mutex, so each queued task goes to
//!   exactly one worker, and a worker runs one task to completion before
//!   receiving the next.
//! - The pool owns a `CancellationToken` handed to every external call;
//!   [`ShutdownMode::Abort`] trips it.
//! - Nothing queued is ever left pending: tasks still in the channel when the
//!   workers are gone are persisted as failed.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{PipelineError, TaskRecord};
use crate::pipeline::{CallContext, StageRunner};

/// Reason recorded on tasks still queued when the pool stops.
pub const DROPPED_AT_SHUTDOWN: &str = "dropped at shutdown";

/// How [`WorkerPool::shutdown`] treats outstanding work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Finish in-flight tasks and everything still queued.
    Drain,
    /// Cancel in-flight external calls and fail everything still queued.
    Abort,
}

pub struct WorkerPool {
    sender: RwLock<Option<mpsc::Sender<TaskRecord>>>,
    receiver: Arc<Mutex<mpsc::Receiver<TaskRecord>>>,
    runner: Arc<StageRunner>,
    cancel: CancellationToken,
    call_timeout: Option<Duration>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool with a queue of `capacity` (at least 1). No workers run
    /// until [`WorkerPool::start`].
    pub fn new(runner: Arc<StageRunner>, capacity: usize, call_timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: RwLock::new(Some(tx)),
            receiver: Arc::new(Mutex::new(rx)),
            runner,
            cancel: CancellationToken::new(),
            call_timeout,
            workers: StdMutex::new(Vec::new()),
        }
    }

    /// Spawn `worker_count` more workers.
    pub fn start(&self, worker_count: usize) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        let first_id = workers.len();
        for worker_id in first_id..first_id + worker_count {
            let receiver = Arc::clone(&self.receiver);
            let runner = Arc::clone(&self.runner);
            let ctx = CallContext::new(self.cancel.clone(), self.call_timeout);
            workers.push(tokio::spawn(worker_loop(worker_id, receiver, runner, ctx)));
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Hand an already-persisted pending task to the workers.
    ///
    /// Waits while the queue is full; fails with `PoolClosed` after shutdown.
    pub async fn enqueue(&self, task: TaskRecord) -> Result<(), PipelineError> {
        // Clone out of the lock so a blocked send does not hold up shutdown.
        let sender = self
            .sender
            .read()
            .await
            .clone()
            .ok_or(PipelineError::PoolClosed)?;
        sender
            .send(task)
            .await
            .map_err(|_| PipelineError::PoolClosed)
    }

    pub async fn is_closed(&self) -> bool {
        self.sender.read().await.is_none()
    }

    /// Stop accepting work and wait for every worker to exit.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        info!(?mode, "worker pool shutting down");
        self.sender.write().await.take();
        if mode == ShutdownMode::Abort {
            self.cancel.cancel();
        }

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker terminated abnormally");
            }
        }

        let mut rx = self.receiver.lock().await;
        rx.close();
        let mut dropped = 0usize;
        while let Ok(task) = rx.try_recv() {
            self.runner.abandon(task, DROPPED_AT_SHUTDOWN).await;
            dropped += 1;
        }
        info!(dropped, "worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<TaskRecord>>>,
    runner: Arc<StageRunner>,
    ctx: CallContext,
) {
    info!(worker_id, "worker started");
    loop {
        // recv は待つ可能性があるので cancel と競合させる
        let next = tokio::select! {
            biased;
            _ = ctx.cancel_token().cancelled() => None,
            task = async { receiver.lock().await.recv().await } => task,
        };
        let Some(task) = next else {
            // Abort か、sender が drop されてキューが空
            break;
        };

        let task_id = task.id;
        info!(worker_id, task_id = %task_id, "picked up task");
        // 失敗は record 側に載るのでここでは扱わない
        let done = runner.run(task, &ctx).await;
        info!(
            worker_id,
            task_id = %task_id,
            status = %done.status,
            "task finished"
        );
    }
    info!(worker_id, "worker stopped");
}
