//! imgdl core: download a batch of images with bounded parallelism, report
//! progress, and clean up completed files when the batch is cancelled.
//!
//! Flow: `config`/`prompt` resolve a [`config::BatchConfig`]; the `scheduler`
//! admits `transfer` units against a shared [`state::BatchState`]; `control`
//! turns signals into cancellation and runs `cleanup` once the scheduler has
//! quiesced.

pub mod cleanup;
pub mod config;
pub mod control;
pub mod logging;
pub mod progress;
pub mod prompt;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod transfer;
