//! # tcg_scrape
//!
//! Scrapes trading-card list pages from one or more sources and returns a
//! single normalized, deduplicated collection of card records.
//!
//! ## Architecture
//!
//! 1. **Fetching** ([`fetch`]): one paced HTTP request per source URL
//! 2. **Extraction** ([`scrapers`]): repeated card containers → neutral records
//! 3. **Normalization** ([`normalize`]): neutral records → [`CardRecord`]s
//! 4. **Aggregation** ([`aggregate`]): request-ordered, deduplicated result
//!
//! [`pipeline::Pipeline`] drives the four steps with bounded concurrency.
//! A failing source only adds an entry to [`PipelineResult::errors`].
//!
//! ```no_run
//! use tcg_scrape::{Pipeline, PipelineOptions, SourceDescriptor};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::http(PipelineOptions::default())?;
//! let sources = SourceDescriptor::from_pairs([
//!     ("https://mytcgcollection.com/list/abc", None),
//! ]);
//! let result = pipeline.run(sources).await?;
//! println!("{} cards, {} failed sources", result.cards.len(), result.errors.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod outputs;
pub mod pipeline;
pub mod retry;
pub mod scrapers;
pub mod utils;

pub use config::PipelineOptions;
pub use error::{FetchFailure, PipelineError, SourceError};
pub use fetch::{FetchPage, HttpFetcher, SourcePolicy};
pub use models::{CardRecord, PipelineResult, ScrapeRequest, SourceDescriptor};
pub use pipeline::Pipeline;
