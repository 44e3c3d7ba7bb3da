//! Pipeline - the stage logic.
//!
//! - `runner`: the Stage Runner and its bookkeeping protocol
//! - `extract`: Media Extraction fork-join
//! - `grid`: Grid Generation
//! - `decode` / `prompts`: talking to the generative service
//! - `context`: cancellation and deadlines for external calls

pub mod context;
pub mod decode;
pub mod extract;
pub mod grid;
pub mod prompts;
pub mod runner;

pub use self::context::CallContext;
pub use self::runner::{PipelineSettings, StageRunner, TaskPaths};
