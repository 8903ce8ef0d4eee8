//! Pipeline options and the optional YAML config file.
//!
//! Every option has a default, so an empty or partial file is valid:
//!
//! ```yaml
//! fetch_timeout_secs: 20
//! max_concurrency: 2
//! min_request_interval_ms: 750
//! accepted_prefix: "https://mytcgcollection.com/"
//! ```
//!
//! Command-line flags override values loaded from the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

pub const DEFAULT_ACCEPTED_PREFIX: &str = "https://mytcgcollection.com/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid accepted prefix {0}")]
    AcceptedPrefix(String),

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Knobs for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Per-request timeout for one list page.
    pub fetch_timeout_secs: u64,
    /// Whole-run deadline; the run is cancelled when it elapses.
    pub run_timeout_secs: Option<u64>,
    /// Cap on simultaneous in-flight fetches.
    pub max_concurrency: usize,
    /// Minimum gap between fetch starts on the same concurrency slot.
    pub min_request_interval_ms: u64,
    /// Cap on sources per request.
    pub max_sources: usize,
    /// Extra attempts for transient fetch failures.
    pub retries: usize,
    /// Base delay for retry backoff.
    pub retry_base_delay_ms: u64,
    pub accepted_prefix: String,
    pub user_agent: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            run_timeout_secs: None,
            max_concurrency: 4,
            min_request_interval_ms: 500,
            max_sources: 10,
            retries: 0,
            retry_base_delay_ms: 1000,
            accepted_prefix: DEFAULT_ACCEPTED_PREFIX.to_string(),
            user_agent: concat!(
                "Mozilla/5.0 (compatible; tcg_scrape/",
                env!("CARGO_PKG_VERSION"),
                ")"
            )
            .to_string(),
        }
    }
}

impl PipelineOptions {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Zero("max_concurrency"));
        }
        if self.max_sources == 0 {
            return Err(ConfigError::Zero("max_sources"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch_timeout_secs"));
        }
        crate::fetch::SourcePolicy::new(&self.accepted_prefix)?;
        Ok(())
    }

    /// Load options from a YAML file.
    ///
    /// Keys missing from the file keep their defaults, and an empty file
    /// yields [`PipelineOptions::default`]. The result is not validated
    /// here; [`crate::Pipeline::new`] does that.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a YAML file such as:
    ///
    /// ```yaml
    /// max_concurrency: 2
    /// min_request_interval_ms: 1000
    /// run_timeout_secs: 120
    /// ```
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file cannot be read, [`ConfigError::Parse`]
    /// if it is not valid YAML for these options.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let options = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        info!(?options, "Loaded configuration");
        Ok(options)
    }

    /// Parse YAML text; blank text means all defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}
