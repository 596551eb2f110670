//! Run configuration and its validation.
//!
//! Raw values arrive as optional strings (from the CLI, the environment, or a
//! test) and are resolved into a [`PipelineConfig`] before any storage call
//! is made.

use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 16;
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

pub const SOURCE_CONTAINER_VAR: &str = "SOURCE_CONTAINER";
pub const DESTINATION_CONTAINER_VAR: &str = "DESTINATION_CONTAINER";
pub const CONCURRENCY_LIMIT_VAR: &str = "CONCURRENCY_LIMIT";
pub const SOURCE_PREFIX_VAR: &str = "SOURCE_PREFIX";
pub const CONTENT_TYPE_VAR: &str = "OUTPUT_CONTENT_TYPE";
pub const LEGACY_SOURCE_VAR: &str = "INPUT_BUCKET";
pub const LEGACY_DESTINATION_VAR: &str = "OUTPUT_BUCKET";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be configured")]
    Missing { name: &'static str },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidLimit { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPipelineConfig {
    pub source_container: Option<String>,
    pub destination_container: Option<String>,
    pub concurrency_limit: Option<String>,
    pub source_prefix: Option<String>,
    pub content_type: Option<String>,
}

impl RawPipelineConfig {
    /// Reads raw values through `lookup`, honouring the legacy bucket
    /// variable names when the primary ones are unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            source_container: lookup(SOURCE_CONTAINER_VAR).or_else(|| lookup(LEGACY_SOURCE_VAR)),
            destination_container: lookup(DESTINATION_CONTAINER_VAR)
                .or_else(|| lookup(LEGACY_DESTINATION_VAR)),
            concurrency_limit: lookup(CONCURRENCY_LIMIT_VAR),
            source_prefix: lookup(SOURCE_PREFIX_VAR),
            content_type: lookup(CONTENT_TYPE_VAR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source_container: Arc<str>,
    pub destination_container: Arc<str>,
    pub source_prefix: Option<String>,
    pub concurrency_limit: NonZeroUsize,
    pub content_type: Option<String>,
    pub show_progress: bool,
}

impl PipelineConfig {
    pub fn new(source_container: &str, destination_container: &str) -> Self {
        Self {
            source_container: Arc::from(source_container),
            destination_container: Arc::from(destination_container),
            source_prefix: None,
            concurrency_limit: default_concurrency_limit(),
            content_type: Some(DEFAULT_CONTENT_TYPE.to_string()),
            show_progress: false,
        }
    }

    pub fn resolve(raw: RawPipelineConfig) -> Result<Self, ConfigError> {
        let source_container = required(raw.source_container, SOURCE_CONTAINER_VAR)?;
        let destination_container =
            required(raw.destination_container, DESTINATION_CONTAINER_VAR)?;
        let concurrency_limit = match raw.concurrency_limit {
            Some(value) => parse_limit(&value)?,
            None => default_concurrency_limit(),
        };
        let source_prefix = raw.source_prefix.filter(|prefix| !prefix.is_empty());
        let content_type = match raw.content_type {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => Some(DEFAULT_CONTENT_TYPE.to_string()),
        };

        Ok(Self {
            source_container: Arc::from(source_container.as_str()),
            destination_container: Arc::from(destination_container.as_str()),
            source_prefix,
            concurrency_limit,
            content_type,
            show_progress: false,
        })
    }

    pub fn with_concurrency_limit(mut self, limit: NonZeroUsize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = Some(prefix.into());
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

pub fn default_concurrency_limit() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CONCURRENCY_LIMIT).unwrap_or(NonZeroUsize::MIN)
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::Missing { name })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { name });
    }
    Ok(trimmed.to_string())
}

fn parse_limit(value: &str) -> Result<NonZeroUsize, ConfigError> {
    value
        .trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| ConfigError::InvalidLimit {
            name: CONCURRENCY_LIMIT_VAR,
            value: value.to_string(),
        })
}
