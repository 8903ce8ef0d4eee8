//! Pipeline orchestration: validate, fan out, pace, aggregate.
//!
//! ```text
//! sources ──► check_request ──► per source (bounded, paced):
//!                                 policy check ─► fetch ─► extract ─► normalize
//!                                                                     │
//!                                      Aggregator (by source index) ◄─┘
//! ```
//!
//! Per-source work runs concurrently up to `max_concurrency`. Fetch starts
//! are paced per concurrency slot by [`Pacer`]: a slot that started a fetch
//! at `t` cannot start the next one before `t + min_request_interval`.
//! Output order always follows request order, never completion order.

use crate::aggregate::Aggregator;
use crate::config::{ConfigError, PipelineOptions};
use crate::error::{FetchFailure, PipelineError, SourceError};
use crate::fetch::{FetchPage, HttpFetcher, SourcePolicy};
use crate::models::{PipelineResult, RawPage, SourceCards, SourceDescriptor, SourceResult};
use crate::normalize::normalize;
use crate::retry::RetryFetch;
use crate::scrapers::Extractor;
use futures::stream::{self, StreamExt};
use scraper::Html;
use std::future::{pending, Future};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

/// Slot pool enforcing the fan-out cap and per-slot request pacing.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    permits: Semaphore,
    /// Last fetch start of every idle slot; `None` for never used.
    idle: Mutex<Vec<Option<Instant>>>,
}

/// A held concurrency slot. Returns to the pool on drop.
#[derive(Debug)]
pub struct PacedSlot<'a> {
    pacer: &'a Pacer,
    last_start: Option<Instant>,
    _permit: SemaphorePermit<'a>,
}

impl Drop for PacedSlot<'_> {
    fn drop(&mut self) {
        self.pacer
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.last_start);
    }
}

impl Pacer {
    pub fn new(slots: usize, interval: Duration) -> Self {
        let slots = slots.max(1);
        Self {
            interval,
            permits: Semaphore::new(slots),
            idle: Mutex::new(vec![None; slots]),
        }
    }

    /// Wait for a free slot and for its pacing interval to elapse.
    pub async fn acquire(&self) -> Result<PacedSlot<'_>, AcquireError> {
        let permit = self.permits.acquire().await?;
        let last_start = {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            // Earliest-ready slot first; never-used slots sort before all.
            let pick = idle
                .iter()
                .enumerate()
                .min_by_key(|(_, start)| **start)
                .map(|(i, _)| i);
            pick.and_then(|i| idle.swap_remove(i))
        };
        let mut slot = PacedSlot {
            pacer: self,
            last_start,
            _permit: permit,
        };

        if let Some(previous) = slot.last_start {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                debug!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "Pacing request");
                sleep_until(ready_at).await;
            }
        }
        slot.last_start = Some(Instant::now());
        Ok(slot)
    }
}

/// Extract and normalize one fetched page.
pub fn process_page(extractor: &Extractor, page: RawPage) -> Result<SourceCards, SourceError> {
    let document = Html::parse_document(&page.body);
    let mut entries = extractor.extract(&document)?;
    let cards = entries
        .by_ref()
        .map(|record| normalize(&record, &page.source))
        .collect();
    Ok(SourceCards {
        cards,
        skipped: entries.skipped(),
    })
}

/// Drives fetch → extract → normalize for every source of a request.
pub struct Pipeline<F> {
    fetcher: RetryFetch<F>,
    extractor: Extractor,
    policy: SourcePolicy,
    options: PipelineOptions,
}

impl Pipeline<HttpFetcher> {
    /// Pipeline backed by the HTTP fetcher built from `options`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the options fail validation, the
    /// accepted prefix is not a URL, or the HTTP client cannot be built.
    pub fn http(options: PipelineOptions) -> Result<Self, ConfigError> {
        let fetcher = HttpFetcher::from_options(&options)?;
        Self::new(fetcher, options)
    }
}

impl<F> Pipeline<F>
where
    F: FetchPage,
{
    /// Create a pipeline around any [`FetchPage`] implementation.
    ///
    /// The fetcher is wrapped in [`RetryFetch`] with the configured retry
    /// count; with `retries = 0` every source gets exactly one attempt.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Page source, e.g. [`HttpFetcher`] or an in-memory double
    /// * `options` - Validated before anything else is built
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for invalid options or accepted prefix.
    pub fn new(fetcher: F, options: PipelineOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let policy = SourcePolicy::new(&options.accepted_prefix)?;
        let fetcher = RetryFetch::new(fetcher, options.retries, options.retry_base_delay());
        Ok(Self {
            fetcher,
            extractor: Extractor::default(),
            policy,
            options,
        })
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// The wrapped fetcher, without the retry layer.
    pub fn fetcher(&self) -> &F {
        self.fetcher.inner()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run every source to a terminal outcome and aggregate the results.
    ///
    /// # Arguments
    ///
    /// * `sources` - Sources in request order; blank or repeated labels are
    ///   made unique before any fetch
    ///
    /// # Returns
    ///
    /// Cards grouped in request order plus one error entry per failed source.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NoSources`] or [`PipelineError::TooManySources`]
    /// before any network activity, or [`PipelineError::Cancelled`] when the
    /// configured run timeout elapses.
    pub async fn run(
        &self,
        sources: Vec<SourceDescriptor>,
    ) -> Result<PipelineResult, PipelineError> {
        self.run_until(sources, pending()).await
    }

    /// Like [`Pipeline::run`], but abandons the run when `cancel` completes.
    ///
    /// Cancellation, or the configured run timeout, drops every in-flight
    /// fetch and returns [`PipelineError::Cancelled`] with no partial result.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tcg_scrape::{Pipeline, PipelineOptions, SourceDescriptor};
    /// # async fn demo(sources: Vec<SourceDescriptor>) -> Result<(), Box<dyn std::error::Error>> {
    /// let pipeline = Pipeline::http(PipelineOptions::default())?;
    /// let interrupted = async {
    ///     let _ = tokio::signal::ctrl_c().await;
    /// };
    /// let result = pipeline.run_until(sources, interrupted).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn run_until<C>(
        &self,
        sources: Vec<SourceDescriptor>,
        cancel: C,
    ) -> Result<PipelineResult, PipelineError>
    where
        C: Future<Output = ()>,
    {
        self.check_request(&sources)?;
        let sources = SourceDescriptor::with_unique_labels(sources);

        let deadline = async {
            match self.options.run_timeout() {
                Some(limit) => {
                    sleep(limit).await;
                    PipelineError::timed_out(limit)
                }
                None => pending::<PipelineError>().await,
            }
        };

        tokio::select! {
            result = self.drive(&sources) => Ok(result),
            err = deadline => {
                warn!(error = %err, "Pipeline run timed out");
                Err(err)
            }
            _ = cancel => {
                warn!("Pipeline run cancelled by caller");
                Err(PipelineError::Cancelled("aborted by caller".to_string()))
            }
        }
    }

    fn check_request(&self, sources: &[SourceDescriptor]) -> Result<(), PipelineError> {
        if sources.is_empty() {
            return Err(PipelineError::NoSources);
        }
        if sources.len() > self.options.max_sources {
            return Err(PipelineError::TooManySources {
                count: sources.len(),
                max: self.options.max_sources,
            });
        }
        Ok(())
    }

    async fn drive(&self, sources: &[SourceDescriptor]) -> PipelineResult {
        info!(
            sources = sources.len(),
            max_concurrency = self.options.max_concurrency,
            min_request_interval_ms = self.options.min_request_interval_ms,
            "Starting pipeline run"
        );
        let pacer = Pacer::new(self.options.max_concurrency, self.options.min_request_interval());
        let pacer = &pacer;
        let mut aggregator = Aggregator::new(sources.len());

        let mut outcomes = stream::iter(sources.iter().enumerate())
            .map(|(index, source)| async move { (index, self.run_source(source, pacer).await) })
            .buffer_unordered(self.options.max_concurrency);

        while let Some((index, outcome)) = outcomes.next().await {
            aggregator.record(index, outcome);
        }
        aggregator.finish()
    }

    #[instrument(level = "info", skip_all, fields(label = %source.label))]
    async fn run_source(&self, source: &SourceDescriptor, pacer: &Pacer) -> SourceResult {
        if let Err(e) = self.policy.check(source) {
            warn!(error = %e, "Rejected source before fetching");
            return SourceResult::failure(&source.label, e);
        }

        let fetched = match pacer.acquire().await {
            Ok(_slot) => self.fetcher.fetch(source).await,
            Err(_) => Err(FetchFailure::Network("request pacer closed".to_string()).into()),
        };

        match fetched.and_then(|page| process_page(&self.extractor, page)) {
            Ok(cards) => {
                info!(cards = cards.cards.len(), skipped = cards.skipped, "Source scraped");
                SourceResult::success(&source.label, cards)
            }
            Err(e) => {
                warn!(error = %e, "Source failed");
                SourceResult::failure(&source.label, e)
            }
        }
    }
}
