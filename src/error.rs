//! Error taxonomy for the scrape pipeline.
//!
//! Errors come in two scopes:
//!
//! - [`SourceError`]: failure of a single source. Captured into the
//!   `errors` map of a [`PipelineResult`](crate::models::PipelineResult) and
//!   never aborts sibling sources.
//! - [`PipelineError`]: failure of the whole run. No result is produced.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a page retrieval failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The request did not complete within the per-call timeout.
    Timeout,
    /// The server answered with a non-success status.
    Status { code: u16, reason: String },
    /// Connection, TLS or body-decoding failure.
    Network(String),
}

impl FetchFailure {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Timeout | FetchFailure::Network(_) => true,
            FetchFailure::Status { code, .. } => *code == 429 || *code >= 500,
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "timeout"),
            FetchFailure::Status { code, reason } if reason.is_empty() => write!(f, "HTTP {code}"),
            FetchFailure::Status { code, reason } => write!(f, "HTTP {code} {reason}"),
            FetchFailure::Network(msg) => write!(f, "network error: {msg}"),
        }
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchFailure::Timeout;
        }
        if let Some(status) = err.status() {
            return FetchFailure::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            };
        }
        FetchFailure::Network(err.to_string())
    }
}

/// Failure scoped to one source of a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("invalid URL: {url} ({reason})")]
    InvalidSource { url: String, reason: String },

    #[error("fetch failed: {0}")]
    Fetch(FetchFailure),

    #[error("unrecognized page structure: {0}")]
    Extract(String),
}

impl From<FetchFailure> for SourceError {
    fn from(failure: FetchFailure) -> Self {
        SourceError::Fetch(failure)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Fetch(err.into())
    }
}

/// Failure of a whole pipeline run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("at least one source is required")]
    NoSources,

    #[error("{count} sources requested, at most {max} are allowed")]
    TooManySources { count: usize, max: usize },

    #[error("pipeline run cancelled: {0}")]
    Cancelled(String),
}

impl PipelineError {
    pub(crate) fn timed_out(after: Duration) -> Self {
        PipelineError::Cancelled(format!("run timed out after {}ms", after.as_millis()))
    }
}
