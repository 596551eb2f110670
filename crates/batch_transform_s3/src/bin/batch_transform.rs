use std::process::ExitCode;

use batch_transform_core::logging::{init_logging, LogFormat};
use batch_transform_s3::adapters::s3_store::S3ObjectStore;
use batch_transform_s3::cli::{run, CliArgs};
use clap::Parser;
use tokio::runtime::Runtime;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(LogFormat::from_env());

    // Owns the runtime for as long as the store may block on it.
    let mut runtime: Option<Runtime> = None;
    let code = run(&args, |_config| {
        let started = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|error| format!("failed to start async runtime: {error}"))?;
        let store = S3ObjectStore::connect(started.handle());
        runtime = Some(started);
        Ok(store)
    });
    drop(runtime);

    ExitCode::from(code)
}
