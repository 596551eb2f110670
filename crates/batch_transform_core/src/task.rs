//! The per-key unit of work: read, transform, write.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::Outcome;
use crate::storage::{ObjectStore, StorageError};
use crate::transform::{ObjectTransform, TransformError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("read failed: {0}")]
    Read(StorageError),

    #[error("transform failed: {0}")]
    Transform(TransformError),

    #[error("write failed: {0}")]
    Write(StorageError),

    #[error("task panicked: {message}")]
    Panicked { message: String },
}

/// Everything a task unit borrows from the run. Shared read-only by all
/// concurrently running units.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub transform: &'a dyn ObjectTransform,
    pub content_type: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUnit {
    pub key: String,
    pub source: Arc<str>,
    pub destination: Arc<str>,
}

impl TaskUnit {
    pub fn new(key: impl Into<String>, source: Arc<str>, destination: Arc<str>) -> Self {
        Self {
            key: key.into(),
            source,
            destination,
        }
    }

    /// Runs the unit to completion. Never fails: every error, including a
    /// panic inside the store or transform, becomes an error outcome.
    pub fn execute(self, context: TaskContext<'_>) -> Outcome {
        let started_at = Instant::now();
        debug!(key = %self.key, "task_started");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(context)))
            .unwrap_or_else(|payload| {
                Err(TaskError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        let duration_ms = started_at.elapsed().as_millis() as u64;
        match result {
            Ok(()) => {
                debug!(key = %self.key, duration_ms, "task_completed");
                Outcome::success(self.key)
            }
            Err(error) => {
                warn!(key = %self.key, duration_ms, error = %error, "task_failed");
                Outcome::error(self.key, error.to_string())
            }
        }
    }

    fn run(&self, context: TaskContext<'_>) -> Result<(), TaskError> {
        let payload = context
            .store
            .read_object(&self.source, &self.key)
            .map_err(TaskError::Read)?;
        let transformed = context
            .transform
            .transform(&payload)
            .map_err(TaskError::Transform)?;
        context
            .store
            .write_object(
                &self.destination,
                &self.key,
                &transformed,
                context.content_type,
            )
            .map_err(TaskError::Write)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
