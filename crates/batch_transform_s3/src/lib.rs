//! AWS-oriented adapter and command-line entry point for the batch transform
//! pipeline.
//!
//! This crate owns runtime integration details (S3 client construction, the
//! tokio runtime bridge, CLI parsing, process exit codes) and delegates all
//! orchestration to `batch_transform_core`.

pub mod adapters;
pub mod cli;
