//! App - wiring and lifecycle.
//!
//! - **AppConfig**: environment-driven configuration
//! - **AppBuilder / App**: assembles ports, runner and pool; submit and poll
//! - **WorkerPool**: bounded queue and workers
//! - **StatusCounts**: per-status totals

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod status;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::config::AppConfig;
pub use self::dispatcher::{ShutdownMode, WorkerPool, DROPPED_AT_SHUTDOWN};
pub use self::status::StatusCounts;
