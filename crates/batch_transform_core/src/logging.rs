use std::sync::OnceLock;

use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";
const DEFAULT_FILTER: &str = "info";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_VAR).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Installs the global subscriber once; later calls are no-ops.
///
/// Logs go to stderr so stdout stays reserved for the run report.
pub fn init_logging(format: LogFormat) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let registry = tracing_subscriber::registry().with(filter);

        let installed = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_names(true)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("global tracing subscriber already installed");
        }
    });
}
