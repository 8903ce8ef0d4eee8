//! Retry with exponential backoff for page fetches.
//!
//! Fetchers never retry on their own. The orchestrator wraps its fetcher in
//! [`RetryFetch`] when `retries > 0`; only transient failures (timeouts,
//! network errors, HTTP 429/5xx) are retried.
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::error::SourceError;
use crate::fetch::FetchPage;
use crate::models::{RawPage, SourceDescriptor};
use rand::{rng, Rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Decorator that retries transient failures of the wrapped fetcher.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: FetchPage,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

fn is_transient(err: &SourceError) -> bool {
    matches!(err, SourceError::Fetch(failure) if failure.is_transient())
}

impl<T> FetchPage for RetryFetch<T>
where
    T: FetchPage,
{
    #[instrument(level = "debug", skip_all, fields(label = %source.label))]
    async fn fetch(&self, source: &SourceDescriptor) -> Result<RawPage, SourceError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(source).await {
                Ok(page) => return Ok(page),
                Err(e) if !is_transient(&e) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchFailure;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        fail_first: usize,
        failure: FetchFailure,
    }

    impl FetchPage for Flaky {
        async fn fetch(&self, source: &SourceDescriptor) -> Result<RawPage, SourceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(self.failure.clone().into());
            }
            Ok(RawPage {
                source: source.clone(),
                body: "ok".into(),
            })
        }
    }

    fn source() -> SourceDescriptor {
        SourceDescriptor::new("https://mytcgcollection.com/list/1", "List 1")
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            fail_first: 2,
            failure: FetchFailure::Timeout,
        };
        let retry = RetryFetch::new(flaky, 3, Duration::from_millis(1));
        let page = retry.fetch(&source()).await.unwrap();
        assert_eq!(page.body, "ok");
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            fail_first: usize::MAX,
            failure: FetchFailure::Status { code: 503, reason: String::new() },
        };
        let retry = RetryFetch::new(flaky, 2, Duration::from_millis(1));
        assert!(retry.fetch(&source()).await.is_err());
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failures_not_retried() {
        let flaky = Flaky {
            calls: AtomicUsize::new(0),
            fail_first: usize::MAX,
            failure: FetchFailure::Status { code: 404, reason: "Not Found".into() },
        };
        let retry = RetryFetch::new(flaky, 5, Duration::from_millis(1));
        assert!(retry.fetch(&source()).await.is_err());
        assert_eq!(retry.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryFetch::new(
            Flaky {
                calls: AtomicUsize::new(0),
                fail_first: 0,
                failure: FetchFailure::Timeout,
            },
            5,
            Duration::from_secs(1),
        );
        assert!(retry.backoff(1) < Duration::from_millis(1251));
        assert!(retry.backoff(10) <= Duration::from_millis(30_250));
    }
}
