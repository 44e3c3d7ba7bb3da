//! scrapify - command-line front end for the media pipeline.
//!
//! - `run <files>`: submit files, process them with the worker pool and wait
//!   until every task is completed or failed. Ctrl-C aborts.
//! - `status <id>`: print one task record as JSON.
//! - `list`: one line per task in the status file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use scrapify_core::app::{App, AppBuilder, AppConfig, ShutdownMode};
use scrapify_core::domain::{TaskId, TaskRecord};
use scrapify_core::impls::JsonFileTaskStore;
use scrapify_core::ports::TaskStore;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "scrapify", version, about = "Turn lecture videos into study guides")]
struct Cli {
    /// Status file (overrides SCRAPIFY_STATUS_FILE).
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit media files and process them.
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Worker count (overrides SCRAPIFY_WORKERS).
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Show one task.
    Status { id: TaskId },
    /// List every task.
    List,
}

/// One line of `list` and `run` output.
#[derive(Debug, Serialize)]
struct Summary<'a> {
    id: String,
    original_name: &'a str,
    status: &'a str,
    stages: usize,
    total_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> From<&'a TaskRecord> for Summary<'a> {
    fn from(record: &'a TaskRecord) -> Self {
        Self {
            id: record.id.to_string(),
            original_name: &record.original_name,
            status: record.status.as_str(),
            stages: record.stages.len(),
            total_time_ms: record.total_time_ms,
            error: record.error(),
        }
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = AppConfig::from_env();
    if let Some(path) = cli.status_file {
        cfg.status_file = path;
    }
    init_tracing(&cfg);

    match cli.command {
        Command::Run { files, workers } => {
            if let Some(workers) = workers {
                cfg.workers = workers;
            }
            run(cfg, files).await
        }
        Command::Status { id } => {
            let store = JsonFileTaskStore::open(&cfg.status_file).await?;
            match store.get(id).await? {
                Some(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(())
                }
                None => bail!("task {id} not found"),
            }
        }
        Command::List => {
            let store = JsonFileTaskStore::open(&cfg.status_file).await?;
            for record in store.list().await? {
                println!("{}", serde_json::to_string(&Summary::from(&record))?);
            }
            Ok(())
        }
    }
}

fn init_tracing(cfg: &AppConfig) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: SCRAPIFY_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run(cfg: AppConfig, files: Vec<PathBuf>) -> anyhow::Result<()> {
    let app = AppBuilder::new(cfg)
        .build()
        .await
        .context("building pipeline")?;
    app.start();
    info!(version = env!("CARGO_PKG_VERSION"), "scrapify started");

    let mut ids = Vec::with_capacity(files.len());
    for file in &files {
        let id = app
            .submit(file)
            .await
            .with_context(|| format!("submitting {}", file.display()))?;
        println!("{id}\t{}", file.display());
        ids.push(id);
    }

    tokio::select! {
        res = wait_for_all(&app, &ids) => res?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; aborting in-flight tasks");
            app.shutdown(ShutdownMode::Abort).await;
            report(&app, &ids).await?;
            bail!("interrupted");
        }
    }

    app.shutdown(ShutdownMode::Drain).await;
    report(&app, &ids).await
}

async fn wait_for_all(app: &App, ids: &[TaskId]) -> anyhow::Result<()> {
    loop {
        let mut remaining = 0usize;
        for id in ids {
            let record = app
                .status(*id)
                .await?
                .with_context(|| format!("task {id} disappeared from the status file"))?;
            if !record.status.is_terminal() {
                remaining += 1;
            }
        }
        if remaining == 0 {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn report(app: &App, ids: &[TaskId]) -> anyhow::Result<()> {
    let mut failed = 0usize;
    for id in ids {
        let Some(record) = app.status(*id).await? else {
            continue;
        };
        if record.error().is_some() {
            failed += 1;
        }
        println!("{}", serde_json::to_string(&Summary::from(&record))?);
    }
    let counts = app.counts().await?;
    info!(
        tasks = counts.total(),
        completed = counts.completed,
        failed = counts.failed,
        "run finished"
    );
    if failed > 0 {
        bail!("{failed} of {} task(s) failed", ids.len());
    }
    Ok(())
}
