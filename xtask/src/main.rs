use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const BINARY_NAME: &str = "batch_transform";
const DIST_DIR: &str = "dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the batch transform workspace",
    long_about = "A unified CLI for local runs, packaging, and CI checks\n\
                  in the batch transform workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline against an in-memory store (no AWS access)
    RunLocal,
    /// Run the pipeline against S3 using SOURCE_CONTAINER / DESTINATION_CONTAINER
    Run {
        /// Maximum number of objects processed at the same time
        #[arg(long, env = "CONCURRENCY_LIMIT")]
        concurrency_limit: Option<usize>,
    },
    /// Run CI checks (fmt, clippy, tests, local example)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Build the release binary and package it as a zip artifact
    Package {
        /// Compilation target triple
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run the local example
    Examples,
    /// Run check + examples
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn binary_name(target: &str) -> String {
    if target.contains("windows") {
        format!("{BINARY_NAME}.exe")
    } else {
        BINARY_NAME.to_string()
    }
}

fn package_binary(target: &str, profile: BuildProfile) {
    step("Build batch_transform binary");

    let mut cargo_args = vec![
        "build",
        "-p",
        "batch_transform_s3",
        "--target",
        target,
        "--bin",
        BINARY_NAME,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");

    let zip_path = dist_dir.join(format!("{BINARY_NAME}.zip"));
    write_zip(&target_dir.join(binary_name(target)), &zip_path);

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn write_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read binary");
    let file = fs::File::create(zip_path).expect("failed to create zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file(BINARY_NAME, options)
        .expect("failed to start binary entry in zip");
    zip.write_all(&binary).expect("failed to write binary entry");
    zip.finish().expect("failed to finish zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test batch_transform_core");
    run_cargo(&["test", "-p", "batch_transform_core"]);

    step("Test batch_transform_s3");
    run_cargo(&["test", "-p", "batch_transform_s3"]);
}

fn ci_examples() {
    step("Run local_run (1 000 in-memory objects)");
    run_cargo(&[
        "run",
        "-p",
        "batch_transform_core",
        "--example",
        "local_run",
        "--release",
    ]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::RunLocal => {
            run_cargo(&[
                "run",
                "-p",
                "batch_transform_core",
                "--example",
                "local_run",
            ]);
        }
        Commands::Run { concurrency_limit } => {
            let limit = concurrency_limit.map(|value| value.to_string());
            let mut args = vec![
                "run",
                "-p",
                "batch_transform_s3",
                "--bin",
                BINARY_NAME,
                "--release",
                "--",
            ];
            if let Some(limit) = limit.as_deref() {
                args.extend(["--concurrency-limit", limit]);
            }
            run_cargo(&args);
        }
        Commands::Ci { job } => match job {
            CiJob::Check => ci_check(),
            CiJob::Examples => ci_examples(),
            CiJob::All => {
                ci_check();
                ci_examples();
            }
        },
        Commands::Package { target, profile } => package_binary(&target, profile),
    }
}
