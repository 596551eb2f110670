//! Enumeration, bounded fan-out, and fan-in of task units.
//!
//! A run lists the whole source container first, then executes one
//! [`TaskUnit`] per key on a dedicated rayon pool sized by the configured
//! concurrency limit. Outcomes are collected in completion order.

use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{error, info};

use crate::aggregator::RunSummary;
use crate::config::{ConfigError, PipelineConfig};
use crate::contract::{Outcome, EXIT_FATAL};
use crate::storage::{list_keys, ObjectStore, StorageError};
use crate::task::{TaskContext, TaskUnit};
use crate::transform::ObjectTransform;

/// Errors that abort a run before any task unit is submitted.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("listing aborted: {0}")]
    List(StorageError),

    #[error("failed to start worker pool: {message}")]
    WorkerPool { message: String },
}

impl PipelineError {
    /// Every pipeline error is fatal and shares one exit code, distinct from
    /// the per-object failure code.
    pub fn exit_code(&self) -> u8 {
        EXIT_FATAL
    }
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Outcomes in the order task units finished.
    pub outcomes: Vec<Outcome>,
    pub summary: RunSummary,
    pub listed_keys: usize,
    pub duration: Duration,
}

/// Materializes every key under the configured source prefix.
///
/// Any listing error discards the partial key set.
pub fn enumerate_keys(
    store: &dyn ObjectStore,
    container: &str,
    prefix: Option<&str>,
) -> Result<Vec<String>, PipelineError> {
    info!(container, prefix = prefix.unwrap_or(""), "listing_started");
    let keys: Vec<String> = list_keys(store, container, prefix)
        .collect::<Result<_, _>>()
        .map_err(|error| {
            error!(container, error = %error, "listing_failed");
            PipelineError::List(error)
        })?;
    info!(container, key_count = keys.len(), "listing_completed");
    Ok(keys)
}

pub fn build_task_units(keys: Vec<String>, config: &PipelineConfig) -> Vec<TaskUnit> {
    keys.into_iter()
        .map(|key| {
            TaskUnit::new(
                key,
                Arc::clone(&config.source_container),
                Arc::clone(&config.destination_container),
            )
        })
        .collect()
}

/// Executes every unit with at most `concurrency_limit` running at once and
/// returns exactly one outcome per unit, in completion order.
pub fn dispatch_tasks(
    units: Vec<TaskUnit>,
    context: TaskContext<'_>,
    concurrency_limit: NonZeroUsize,
    show_progress: bool,
) -> Result<Vec<Outcome>, PipelineError> {
    let total = units.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency_limit.get())
        .thread_name(|index| format!("batch-transform-{index}"))
        .build()
        .map_err(|error| PipelineError::WorkerPool {
            message: error.to_string(),
        })?;

    let progress = show_progress.then(|| progress_bar(total));
    let (sender, receiver) = mpsc::channel::<Outcome>();

    pool.install(|| {
        units
            .into_par_iter()
            .with_max_len(1)
            .for_each_with(sender, |sender, unit| {
                let outcome = unit.execute(context);
                if let Some(progress) = &progress {
                    progress.inc(1);
                }
                // The receiver outlives the pool; a send cannot fail here.
                let _ = sender.send(outcome);
            });
    });

    if let Some(progress) = &progress {
        progress.finish_with_message("Completed");
    }

    Ok(receiver.into_iter().collect())
}

/// Lists, dispatches, and aggregates one complete run.
pub fn run_pipeline(
    store: &dyn ObjectStore,
    transform: &dyn ObjectTransform,
    config: &PipelineConfig,
) -> Result<PipelineRun, PipelineError> {
    let started_at = Instant::now();
    let keys = enumerate_keys(
        store,
        &config.source_container,
        config.source_prefix.as_deref(),
    )?;
    let listed_keys = keys.len();

    let units = build_task_units(keys, config);
    let context = TaskContext {
        store,
        transform,
        content_type: config.content_type.as_deref(),
    };
    info!(
        task_count = units.len(),
        concurrency_limit = config.concurrency_limit.get(),
        destination = %config.destination_container,
        "dispatch_started"
    );
    let outcomes = dispatch_tasks(
        units,
        context,
        config.concurrency_limit,
        config.show_progress,
    )?;

    let summary = RunSummary::from_outcomes(&outcomes);
    let duration = started_at.elapsed();
    info!(
        total = summary.total_count,
        success = summary.success_count,
        errors = summary.error_count,
        duration_ms = duration.as_millis() as u64,
        "run_completed"
    );

    Ok(PipelineRun {
        outcomes,
        summary,
        listed_keys,
        duration,
    })
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}
