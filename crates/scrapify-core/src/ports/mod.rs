//! Ports - the seams between the pipeline and the outside world.
//!
//! Each trait hides an external system (status file, ffmpeg, the generative
//! model, the clock) so the pipeline can be driven by fakes in tests and the
//! adapters in `impls` can be swapped without touching stage logic.

pub mod clock;
pub mod generator;
pub mod id_generator;
pub mod task_store;
pub mod transcoder;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::generator::{Attachment, GenerationRequest, GenerativeService};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::TaskStore;
pub use self::transcoder::MediaTranscoder;
