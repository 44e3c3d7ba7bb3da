//! Adapters for the ports.
//!
//! - `JsonFileTaskStore` / `InMemoryTaskStore`: Status Store
//! - `FfmpegTranscoder`: transcoding tool
//! - `GeminiClient`: generative service

pub mod ffmpeg;
pub mod gemini;
pub mod inmem_store;
pub mod json_store;

pub use self::ffmpeg::FfmpegTranscoder;
pub use self::gemini::GeminiClient;
pub use self::inmem_store::InMemoryTaskStore;
pub use self::json_store::JsonFileTaskStore;
