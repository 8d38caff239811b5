//! Configuration file support.
//!
//! Settings come from a TOML file (`./config/main.toml` unless `--config` says
//! otherwise). CLI flags override file values.
//!
//! ```toml
//! [request]
//! url = "https://api-ddc.wallstcn.com/market/kline"
//! instrument = "US10YR.OTC"
//! utc_offset = "+08:00"
//!
//! [request.params]
//! period_type = "86400"
//!
//! [output]
//! path = "./data/us10yr.csv"
//!
//! [pipeline]
//! workers = 4
//! ```

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::downloader::config::{
    DEFAULT_WORKERS, MAX_RETRIES, MAX_WORKERS, RETRY_PRIORITY_PENALTY, TASK_WAIT_TIMEOUT,
};
use crate::downloader::PipelineSettings;
use crate::fetcher::RequestInfo;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "./config/main.toml";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "tick_data_downloader=info";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("invalid TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Values parse but cannot be used
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Whole config file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    /// Remote source
    pub request: RequestSection,
    /// Output file
    pub output: OutputSection,
    /// Pipeline tunables
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// Logging
    #[serde(default)]
    pub log: LogSection,
}

/// `[request]`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RequestSection {
    /// Kline endpoint
    pub url: String,
    /// Single instrument to seed
    pub instrument: Option<String>,
    /// Several instruments to seed
    #[serde(default)]
    pub instruments: Vec<String>,
    /// Zone of `tick_at` timestamps, e.g. `+08:00`. UTC when absent.
    pub utc_offset: Option<String>,
    /// Extra query parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// `[output]`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OutputSection {
    /// CSV file path
    pub path: PathBuf,
}

/// `[pipeline]`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PipelineSection {
    /// Worker pool size
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Attempts per task
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Priority increase per retry
    #[serde(default = "default_retry_priority_penalty")]
    pub retry_priority_penalty: i64,
    /// Task queue wait in seconds
    #[serde(default = "default_task_wait_timeout_secs")]
    pub task_wait_timeout_secs: u64,
}

const fn default_workers() -> usize {
    DEFAULT_WORKERS
}

const fn default_max_retries() -> u32 {
    MAX_RETRIES
}

const fn default_retry_priority_penalty() -> i64 {
    RETRY_PRIORITY_PENALTY
}

const fn default_task_wait_timeout_secs() -> u64 {
    TASK_WAIT_TIMEOUT.as_secs()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_retries: default_max_retries(),
            retry_priority_penalty: default_retry_priority_penalty(),
            task_wait_timeout_secs: default_task_wait_timeout_secs(),
        }
    }
}

impl PipelineSection {
    /// Convert to executor settings
    pub fn to_settings(&self) -> PipelineSettings {
        PipelineSettings {
            workers: self.workers,
            max_retries: self.max_retries,
            retry_priority_penalty: self.retry_priority_penalty,
            task_wait_timeout: Duration::from_secs(self.task_wait_timeout_secs),
        }
    }
}

/// `[log]`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct LogSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: Option<String>,
}

impl LogSection {
    /// Effective filter directive
    pub fn filter_or_default(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Parse `+HH:MM` / `-HH:MM` (or `Z`) into a fixed offset
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ConfigError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| ConfigError::Invalid("zero offset out of range".to_string()));
    }
    value
        .parse::<FixedOffset>()
        .map_err(|e| ConfigError::Invalid(format!("utc_offset '{value}': {e}")))
}

impl AppConfig {
    /// Parse config from a TOML string and validate it
    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&content)
    }

    /// Instruments to seed, `instrument` first, duplicates removed
    pub fn instruments(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for code in self
            .request
            .instrument
            .iter()
            .chain(self.request.instruments.iter())
        {
            let code = code.trim();
            if !code.is_empty() && !out.iter().any(|c| c == code) {
                out.push(code.to_string());
            }
        }
        out
    }

    /// Configured `tick_at` zone
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        match &self.request.utc_offset {
            Some(value) => parse_utc_offset(value),
            None => parse_utc_offset("Z"),
        }
    }

    /// Request info for the HTTP fetcher
    pub fn request_info(&self) -> Result<RequestInfo, ConfigError> {
        Ok(RequestInfo::new(self.request.url.trim())
            .with_params(self.request.params.clone())
            .with_utc_offset(self.utc_offset()?))
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request.url.trim().is_empty() {
            return Err(ConfigError::Invalid("request.url must not be empty".to_string()));
        }
        if self.instruments().is_empty() {
            return Err(ConfigError::Invalid(
                "request.instrument or request.instruments is required".to_string(),
            ));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output.path must not be empty".to_string()));
        }
        if self.pipeline.workers == 0 || self.pipeline.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid(format!(
                "pipeline.workers must be between 1 and {MAX_WORKERS}"
            )));
        }
        if self.pipeline.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_retries must be at least 1".to_string(),
            ));
        }
        self.utc_offset()?;
        Ok(())
    }
}
