//! Run the pipeline against an in-memory store seeded with 1 000 JSON
//! documents, a few of them malformed, and print the report.
//!
//! Run with: cargo run -p batch_transform_core --example local_run

use std::num::NonZeroUsize;

use batch_transform_core::aggregator::failed_objects;
use batch_transform_core::logging::{init_logging, LogFormat};
use batch_transform_core::{
    render_report, run_pipeline, BaseWordsTransform, MemoryObjectStore, PipelineConfig,
};

fn main() {
    const NUM_OBJECTS: usize = 1_000;
    const PAGE_SIZE: usize = 100;

    init_logging(LogFormat::from_env());

    let store = MemoryObjectStore::with_page_size(PAGE_SIZE);
    for index in 0..NUM_OBJECTS {
        let body = match index % 250 {
            0 => b"{\"base_words\": [".to_vec(),
            1 => br#"{"base_words":"not-a-list"}"#.to_vec(),
            _ => format!(r#"{{"id":{index},"base_words":["seed"]}}"#).into_bytes(),
        };
        store.seed_object("local-input", &format!("words/{index:04}.json"), &body);
    }

    let config = PipelineConfig::new("local-input", "local-output")
        .with_concurrency_limit(NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN))
        .with_progress(true);
    let transform = BaseWordsTransform::from_seed(123);

    let run = match run_pipeline(&store, &transform, &config) {
        Ok(run) => run,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(i32::from(error.exit_code()));
        }
    };

    println!("Found {} files in {}", run.listed_keys, config.source_container);
    for line in render_report(&run.summary, &failed_objects(&run.outcomes)) {
        println!("{line}");
    }
    println!(
        "Wall time: {:.1} ms, objects in destination: {}",
        run.duration.as_secs_f64() * 1_000.0,
        store.snapshot("local-output").len()
    );
}
