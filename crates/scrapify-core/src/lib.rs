//! scrapify-core
//!
//! Asynchronous media pipeline: a submitted video is driven through a fixed
//! sequence of stages (media extraction, grid generation, transcription,
//! study guide generation) by a bounded worker pool, with every stage
//! transition persisted so pollers always see a consistent snapshot.
//!
//! # Modules
//! - **domain**: task and stage records, status, derived documents, errors
//! - **ports**: TaskStore, MediaTranscoder, GenerativeService, Clock, IdGenerator
//! - **impls**: JSON file / in-memory stores, ffmpeg, Gemini
//! - **pipeline**: Stage Runner, fork-join extraction, grid composition
//! - **app**: configuration, builder, worker pool, status counts

pub mod app;
pub mod domain;
pub mod impls;
pub mod pipeline;
pub mod ports;
