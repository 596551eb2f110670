use std::path::PathBuf;

use batch_transform_core::aggregator::failed_objects;
use batch_transform_core::config::{
    CONCURRENCY_LIMIT_VAR, CONTENT_TYPE_VAR, DESTINATION_CONTAINER_VAR, LEGACY_DESTINATION_VAR,
    LEGACY_SOURCE_VAR, SOURCE_CONTAINER_VAR, SOURCE_PREFIX_VAR,
};
use batch_transform_core::{
    render_report, run_pipeline, BaseWordsTransform, ConfigError, ObjectStore, PipelineConfig,
    RawPipelineConfig, RunReport, EXIT_FATAL,
};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "batch_transform",
    about = "Transform every object in a source bucket into a destination bucket",
    long_about = "Lists every object in the source bucket, applies the base-words transform\n\
                  to each one on a bounded worker pool, and writes the result to the\n\
                  destination bucket under the same key.\n\n\
                  Exit codes: 0 all objects succeeded, 1 some objects failed,\n\
                  2 configuration or listing failed before any object was processed."
)]
pub struct CliArgs {
    /// Bucket to read objects from
    #[arg(long, env = SOURCE_CONTAINER_VAR)]
    pub source_container: Option<String>,

    /// Bucket to write transformed objects to
    #[arg(long, env = DESTINATION_CONTAINER_VAR)]
    pub destination_container: Option<String>,

    #[arg(long = "input-bucket", env = LEGACY_SOURCE_VAR, hide = true)]
    pub legacy_source: Option<String>,

    #[arg(long = "output-bucket", env = LEGACY_DESTINATION_VAR, hide = true)]
    pub legacy_destination: Option<String>,

    /// Maximum number of objects processed at the same time
    #[arg(long, env = CONCURRENCY_LIMIT_VAR)]
    pub concurrency_limit: Option<String>,

    /// Only process keys starting with this prefix
    #[arg(long, env = SOURCE_PREFIX_VAR)]
    pub source_prefix: Option<String>,

    /// Content-Type set on every written object (empty to omit)
    #[arg(long, env = CONTENT_TYPE_VAR)]
    pub content_type: Option<String>,

    /// Seed for the token generator; random when omitted
    #[arg(long, env = "TRANSFORM_SEED")]
    pub seed: Option<u64>,

    /// Write a JSON run summary to this path
    #[arg(long, env = "SUMMARY_PATH")]
    pub summary_path: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl CliArgs {
    /// Resolves flags and their environment variables through the same
    /// lookup the config layer uses, so legacy fallbacks live in one place.
    pub fn raw_config(&self) -> RawPipelineConfig {
        RawPipelineConfig::from_lookup(|name| match name {
            SOURCE_CONTAINER_VAR => self.source_container.clone(),
            DESTINATION_CONTAINER_VAR => self.destination_container.clone(),
            LEGACY_SOURCE_VAR => self.legacy_source.clone(),
            LEGACY_DESTINATION_VAR => self.legacy_destination.clone(),
            CONCURRENCY_LIMIT_VAR => self.concurrency_limit.clone(),
            SOURCE_PREFIX_VAR => self.source_prefix.clone(),
            CONTENT_TYPE_VAR => self.content_type.clone(),
            _ => None,
        })
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        PipelineConfig::resolve(self.raw_config())
            .map(|config| config.with_progress(!self.no_progress))
    }

    pub fn transform(&self) -> BaseWordsTransform {
        match self.seed {
            Some(seed) => BaseWordsTransform::from_seed(seed),
            None => BaseWordsTransform::from_entropy(),
        }
    }
}

/// Validates configuration, then connects a store and runs the pipeline.
///
/// `connect` is only invoked once the configuration resolved, so a bad
/// configuration never reaches storage. Returns the process exit code.
pub fn run<S, F>(args: &CliArgs, connect: F) -> u8
where
    S: ObjectStore,
    F: FnOnce(&PipelineConfig) -> Result<S, String>,
{
    let config = match args.pipeline_config() {
        Ok(config) => config,
        Err(config_error) => {
            error!(error = %config_error, "configuration_invalid");
            eprintln!("Configuration error: {config_error}");
            return EXIT_FATAL;
        }
    };

    let store = match connect(&config) {
        Ok(store) => store,
        Err(message) => {
            error!(error = %message, "store_connect_failed");
            eprintln!("Fatal: {message}");
            return EXIT_FATAL;
        }
    };
    info!(
        source = %config.source_container,
        destination = %config.destination_container,
        concurrency_limit = config.concurrency_limit.get(),
        "batch_transform_starting"
    );

    execute(args, &config, &store)
}

/// Runs the pipeline against `store` and returns the process exit code.
pub fn execute(args: &CliArgs, config: &PipelineConfig, store: &dyn ObjectStore) -> u8 {
    let transform = args.transform();
    let run = match run_pipeline(store, &transform, config) {
        Ok(run) => run,
        Err(pipeline_error) => {
            error!(error = %pipeline_error, "run_aborted");
            eprintln!("Fatal: {pipeline_error}");
            return pipeline_error.exit_code();
        }
    };

    println!("Found {} files in {}", run.listed_keys, config.source_container);
    let failures = failed_objects(&run.outcomes);
    for line in render_report(&run.summary, &failures) {
        println!("{line}");
    }

    if let Some(path) = &args.summary_path {
        let report = RunReport::new(
            &config.source_container,
            &config.destination_container,
            &run.outcomes,
            Utc::now(),
            run.duration.as_millis() as u64,
        );
        if let Err(message) = report.write_json(path) {
            warn!(error = %message, "summary_write_failed");
        }
    }

    run.summary.exit_code()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use batch_transform_core::{MemoryObjectStore, RunReport, EXIT_SUCCESS};

    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("batch_transform").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn legacy_bucket_flags_fill_missing_containers() {
        let args = parse(&["--input-bucket", "in", "--output-bucket", "out"]);
        let config = args.pipeline_config().expect("config should resolve");
        assert_eq!(&*config.source_container, "in");
        assert_eq!(&*config.destination_container, "out");
        assert!(config.show_progress);
    }

    #[test]
    fn missing_destination_is_a_config_error() {
        let args = parse(&["--source-container", "in"]);
        let error = args.pipeline_config().expect_err("config should fail");
        assert_eq!(error.to_string(), "DESTINATION_CONTAINER must be configured");
    }

    #[test]
    fn flags_take_precedence_over_legacy_buckets() {
        let args = parse(&[
            "--source-container",
            "in",
            "--input-bucket",
            "legacy-in",
            "--output-bucket",
            "legacy-out",
        ]);
        let raw = args.raw_config();
        assert_eq!(raw.source_container.as_deref(), Some("in"));
        assert_eq!(raw.destination_container.as_deref(), Some("legacy-out"));
    }

    #[test]
    fn config_error_exits_fatal_without_connecting() {
        let args = parse(&["--destination-container", "out", "--no-progress"]);
        let connected = Cell::new(false);

        let code = run(&args, |_config| {
            connected.set(true);
            Ok(MemoryObjectStore::new())
        });

        assert_eq!(code, EXIT_FATAL);
        assert!(!connected.get());
    }

    #[test]
    fn invalid_limit_exits_fatal_without_connecting() {
        let args = parse(&[
            "--source-container",
            "in",
            "--destination-container",
            "out",
            "--concurrency-limit",
            "0",
        ]);
        let connected = Cell::new(false);

        let code = run(&args, |_config| {
            connected.set(true);
            Ok(MemoryObjectStore::new())
        });

        assert_eq!(code, EXIT_FATAL);
        assert!(!connected.get());
    }

    #[test]
    fn connect_failure_exits_fatal() {
        let args = parse(&[
            "--source-container",
            "in",
            "--destination-container",
            "out",
        ]);

        let code = run(&args, |_config| {
            Err::<MemoryObjectStore, _>("no credentials".to_string())
        });

        assert_eq!(code, EXIT_FATAL);
    }

    #[test]
    fn run_connects_with_resolved_config() {
        let args = parse(&[
            "--source-container",
            "in",
            "--destination-container",
            "out",
            "--seed",
            "3",
            "--no-progress",
        ]);
        let store = MemoryObjectStore::new();
        store.seed_object("in", "a.json", br#"{"base_words":[]}"#);

        let code = run(&args, |config| {
            assert_eq!(&*config.source_container, "in");
            assert!(!config.show_progress);
            Ok(&store)
        });

        assert_eq!(code, EXIT_SUCCESS);
        assert!(store.object("out", "a.json").is_some());
    }

    #[test]
    fn execute_reports_success_and_writes_summary() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let summary_path = dir.path().join("run.json");
        let summary_arg = summary_path.to_string_lossy().to_string();
        let args = parse(&[
            "--source-container",
            "in",
            "--destination-container",
            "out",
            "--concurrency-limit",
            "2",
            "--seed",
            "9",
            "--no-progress",
            "--summary-path",
            &summary_arg,
        ]);
        let config = args.pipeline_config().expect("config should resolve");
        let store = MemoryObjectStore::new();
        store.seed_object("in", "a.json", br#"{"base_words":["x"]}"#);

        let code = execute(&args, &config, &store);

        assert_eq!(code, EXIT_SUCCESS);
        let report: RunReport = serde_json::from_slice(
            &std::fs::read(&summary_path).expect("summary should be written"),
        )
        .expect("summary should parse");
        assert_eq!(report.summary.success_count, 1);
        assert_eq!(report.destination_container, "out");
    }

    #[test]
    fn execute_returns_fatal_code_when_listing_fails() {
        let args = parse(&[
            "--source-container",
            "absent",
            "--destination-container",
            "out",
            "--no-progress",
        ]);
        let config = args.pipeline_config().expect("config should resolve");
        let store = MemoryObjectStore::new();

        assert_eq!(execute(&args, &config, &store), EXIT_FATAL);
        assert!(store.snapshot("out").is_empty());
    }
}
