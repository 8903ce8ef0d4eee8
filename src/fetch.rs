//! Page retrieval for list sources.
//!
//! The orchestrator talks to the network through the [`FetchPage`] trait so
//! it can be driven by the reqwest-backed [`HttpFetcher`] or by an
//! in-memory double. Fetchers issue exactly one request per call and never
//! retry; retry policy lives in [`crate::retry`].
//!
//! Every source URL is checked against a [`SourcePolicy`] before any
//! request goes out.

use crate::config::{ConfigError, PipelineOptions};
use crate::error::{FetchFailure, SourceError};
use crate::models::{RawPage, SourceDescriptor};
use crate::utils::truncate_for_log;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// The single origin and path prefix sources must live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePolicy {
    prefix: Url,
}

impl SourcePolicy {
    /// Parse the accepted prefix.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Absolute URL such as `https://mytcgcollection.com/`;
    ///   its path is the required path prefix
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AcceptedPrefix`] if `prefix` does not parse or
    /// has no host.
    pub fn new(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = Url::parse(prefix)
            .map_err(|e| ConfigError::AcceptedPrefix(format!("{prefix}: {e}")))?;
        if prefix.host_str().is_none() {
            return Err(ConfigError::AcceptedPrefix(format!("{prefix}: no host")));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &Url {
        &self.prefix
    }

    /// Whether `url` has the prefix's origin and starts with its path.
    pub fn allows(&self, url: &Url) -> bool {
        url.scheme() == self.prefix.scheme()
            && url.host_str() == self.prefix.host_str()
            && url.port_or_known_default() == self.prefix.port_or_known_default()
            && url.path().starts_with(self.prefix.path())
    }

    /// Validate a source URL without touching the network.
    ///
    /// # Returns
    ///
    /// The parsed URL to request.
    ///
    /// # Errors
    ///
    /// [`SourceError::InvalidSource`] when the URL is empty, does not parse,
    /// or lies outside the accepted prefix.
    pub fn check(&self, source: &SourceDescriptor) -> Result<Url, SourceError> {
        let invalid = |reason: String| SourceError::InvalidSource {
            url: source.url.clone(),
            reason,
        };

        let raw = source.url.trim();
        if raw.is_empty() {
            return Err(invalid("URL is empty".to_string()));
        }
        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

        if !self.allows(&url) {
            return Err(invalid(format!("must start with {}", self.prefix)));
        }
        Ok(url)
    }

    /// Redirect policy that only follows hops staying inside the prefix.
    ///
    /// A hop leaving the prefix is not followed; the 3xx response comes
    /// back to [`HttpFetcher::fetch`], which reports it as
    /// [`SourceError::InvalidSource`].
    pub fn redirect_policy(&self) -> reqwest::redirect::Policy {
        let policy = self.clone();
        reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS || !policy.allows(attempt.url()) {
                attempt.stop()
            } else {
                attempt.follow()
            }
        })
    }

    fn outside(&self, url: String) -> SourceError {
        SourceError::InvalidSource {
            url,
            reason: format!("redirected outside {}", self.prefix),
        }
    }
}

const MAX_REDIRECTS: usize = 10;

/// One outbound page retrieval per call.
pub trait FetchPage {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<RawPage, SourceError>;
}

/// Fetches list pages over HTTP with a shared client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: SourcePolicy,
}

impl HttpFetcher {
    /// Wrap an existing client.
    ///
    /// Pages whose final URL lies outside `policy` are rejected even when
    /// `client` follows redirects on its own; build the client with
    /// [`SourcePolicy::redirect_policy`] to stop such hops before they are
    /// requested.
    pub fn new(client: reqwest::Client, policy: SourcePolicy) -> Self {
        Self { client, policy }
    }

    /// Build a client with the configured per-call timeout, user agent and
    /// prefix-bound redirect policy.
    ///
    /// # Errors
    ///
    /// [`ConfigError::AcceptedPrefix`] for a bad prefix, [`ConfigError::Client`]
    /// if the TLS backend cannot be initialized.
    pub fn from_options(options: &PipelineOptions) -> Result<Self, ConfigError> {
        let policy = SourcePolicy::new(&options.accepted_prefix)?;
        let client = reqwest::Client::builder()
            .timeout(options.fetch_timeout())
            .user_agent(options.user_agent.as_str())
            .redirect(policy.redirect_policy())
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self::new(client, policy))
    }
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(label = %source.label, url = %source.url))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<RawPage, SourceError> {
        let url = self.policy.check(source)?;
        let t0 = Instant::now();

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status.is_redirection() {
            let target = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|loc| url.join(loc).map(String::from).unwrap_or_else(|_| loc.to_string()))
                .unwrap_or_default();
            warn!(status = status.as_u16(), %target, "Redirect leaves the accepted prefix");
            return Err(self.policy.outside(target));
        }
        if !self.policy.allows(response.url()) {
            warn!(final_url = %response.url(), "Redirect left the accepted prefix");
            return Err(self.policy.outside(response.url().to_string()));
        }
        if !status.is_success() {
            let preview = response.text().await.unwrap_or_default();
            debug!(body = %truncate_for_log(&preview, 200), "Error response body");
            warn!(status = status.as_u16(), "List page returned error status");
            return Err(FetchFailure::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            }
            .into());
        }

        let body = response.text().await?;
        info!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched list page"
        );
        Ok(RawPage {
            source: source.clone(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SourcePolicy {
        SourcePolicy::new("https://mytcgcollection.com/").unwrap()
    }

    #[test]
    fn test_accepts_site_urls() {
        let source = SourceDescriptor::new("https://mytcgcollection.com/list/abc123", "L");
        let url = policy().check(&source).unwrap();
        assert_eq!(url.path(), "/list/abc123");
    }

    #[test]
    fn test_rejects_other_hosts() {
        let source = SourceDescriptor::new("https://example.com/x", "L");
        let err = policy().check(&source).unwrap_err();
        assert!(matches!(err, SourceError::InvalidSource { .. }));
        assert!(err.to_string().contains("must start with https://mytcgcollection.com/"));
    }

    #[test]
    fn test_rejects_lookalikes_and_schemes() {
        for url in [
            "http://mytcgcollection.com/list/1",
            "https://mytcgcollection.com.evil.io/list/1",
            "https://mytcgcollection.com:8443/list/1",
            "mytcgcollection.com/list/1",
            "",
        ] {
            let source = SourceDescriptor::new(url, "L");
            assert!(policy().check(&source).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_path_prefix() {
        let policy = SourcePolicy::new("https://mytcgcollection.com/list/").unwrap();
        assert!(policy.check(&SourceDescriptor::new("https://mytcgcollection.com/list/9", "L")).is_ok());
        assert!(policy.check(&SourceDescriptor::new("https://mytcgcollection.com/card/9", "L")).is_err());
    }

    #[test]
    fn test_allows_matches_check() {
        let policy = policy();
        let inside = Url::parse("https://mytcgcollection.com/list/2").unwrap();
        let outside = Url::parse("https://cdn.example.com/list/2").unwrap();
        assert!(policy.allows(&inside));
        assert!(!policy.allows(&outside));
        let err = policy.outside(outside.to_string());
        assert_eq!(
            err.to_string(),
            "invalid URL: https://cdn.example.com/list/2 (redirected outside https://mytcgcollection.com/)"
        );
    }

    #[test]
    fn test_bad_prefix_is_config_error() {
        assert!(matches!(
            SourcePolicy::new("not a url"),
            Err(ConfigError::AcceptedPrefix(_))
        ));
    }
}
