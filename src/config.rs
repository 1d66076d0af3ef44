//! Runtime configuration.
//!
//! Built once at startup from the environment (plus an optional `.env`
//! file) and passed explicitly to the dispatcher, writer and pipeline.

use crate::error::{Result, ScholarError};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the SerpAPI key
pub const API_KEY_VAR: &str = "SERPAPI_KEY";

/// Optional override of the search endpoint
pub const ENDPOINT_VAR: &str = "SERPAPI_ENDPOINT";

/// Optional default result count
pub const NUM_RESULTS_VAR: &str = "SCHOLARCSV_NUM_RESULTS";

/// Optional output directory
pub const OUTPUT_DIR_VAR: &str = "SCHOLARCSV_OUTPUT_DIR";

/// SerpAPI search endpoint
pub const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search";

/// Results requested when nothing else is configured
pub const DEFAULT_RESULT_COUNT: u32 = 10;

/// Directory (relative to the working directory) that receives CSV files
pub const DEFAULT_OUTPUT_DIR: &str = "research_results";

/// Retry behaviour around the single search request.
///
/// The default performs no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Wait before the first retry; doubled after each attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub result_count: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub retries: Option<u32>,
}

/// Immutable run configuration.
#[derive(Clone)]
pub struct Config {
    /// SerpAPI key (secret)
    pub api_key: String,
    /// Search endpoint URL
    pub endpoint: String,
    /// Requested number of results
    pub result_count: u32,
    /// Directory receiving CSV output
    pub output_dir: PathBuf,
    /// Retry behaviour for the search request
    pub retry: RetryPolicy,
}

impl Config {
    /// Create a configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            result_count: DEFAULT_RESULT_COUNT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            retry: RetryPolicy::default(),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first if present.
    ///
    /// # Errors
    ///
    /// Returns `ScholarError::Config` if `SERPAPI_KEY` is missing or blank,
    /// or if an optional variable cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ScholarError::Config(format!(
                    "SerpAPI key is missing. Set it via the {} environment variable.",
                    API_KEY_VAR
                ))
            })?;

        let mut config = Self::new(api_key);

        if let Some(endpoint) = lookup(ENDPOINT_VAR).filter(|v| !v.trim().is_empty()) {
            config.endpoint = endpoint.trim().to_string();
        }

        if let Some(raw) = lookup(NUM_RESULTS_VAR).filter(|v| !v.trim().is_empty()) {
            config.result_count = parse_result_count(&raw)?;
        }

        if let Some(dir) = lookup(OUTPUT_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            config.output_dir = PathBuf::from(dir.trim());
        }

        Ok(config)
    }

    /// Apply command-line overrides on top of this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ScholarError::Config` if the result count override is zero.
    pub fn apply_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(num) = overrides.result_count {
            if num == 0 {
                return Err(ScholarError::Config(
                    "--num must be a positive integer".to_string(),
                ));
            }
            self.result_count = num;
        }
        if let Some(ref dir) = overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(ref endpoint) = overrides.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(retries) = overrides.retries {
            self.retry.max_retries = retries;
        }
        Ok(self)
    }

    /// Override the result count.
    pub fn with_result_count(mut self, count: u32) -> Self {
        self.result_count = count;
        self
    }

    /// Override the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Override the search endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

// The key stays out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("result_count", &self.result_count)
            .field("output_dir", &self.output_dir)
            .field("retry", &self.retry)
            .finish()
    }
}

fn parse_result_count(raw: &str) -> Result<u32> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ScholarError::Config(format!(
            "{} must be a positive integer, got '{}'",
            NUM_RESULTS_VAR, raw
        ))),
    }
}
