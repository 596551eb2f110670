//! Storage-agnostic batch transform pipeline.
//!
//! This crate owns enumeration, bounded fan-out of per-object task units, and
//! fan-in of their outcomes into a run summary and exit code. It intentionally
//! excludes AWS SDK concerns; backends plug in through [`storage::ObjectStore`]
//! and business logic through [`transform::ObjectTransform`].

pub mod aggregator;
pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod logging;
pub mod memory_store;
pub mod storage;
pub mod task;
pub mod transform;

pub use aggregator::{render_report, RunReport, RunSummary};
pub use config::{ConfigError, PipelineConfig, RawPipelineConfig};
pub use contract::{Outcome, OutcomeStatus, EXIT_FATAL, EXIT_OBJECT_FAILURES, EXIT_SUCCESS};
pub use dispatcher::{run_pipeline, PipelineError, PipelineRun};
pub use memory_store::MemoryObjectStore;
pub use storage::{list_keys, KeyPage, ObjectStore, StorageError};
pub use task::{TaskContext, TaskError, TaskUnit};
pub use transform::{BaseWordsTransform, ObjectTransform, TransformError};
