//! Command-line interface definitions for tcg_scrape.
//!
//! Sources come either from repeated `--source` flags (with optional
//! `--label` flags matched by position) or from a `--request` file. Option
//! flags override values from the `--config` file.

use crate::catalog::cache::DiskCache;
use crate::catalog::tcgcsv::DEFAULT_BASE_URL;
use crate::config::PipelineOptions;
use crate::filter::{FilterCriteria, GroupingKey};
use crate::models::SourceDescriptor;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for tcg_scrape.
///
/// # Examples
///
/// ```sh
/// # Two lists, the second one labelled
/// tcg_scrape -s https://mytcgcollection.com/list/abc -s https://mytcgcollection.com/list/def -l "" -l Trades
///
/// # Request file, catalog enrichment, rare cards only, written to ./out
/// tcg_scrape -r request.json --enrich --rarity "Double Rare" -o ./out
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// List page URL to scrape (repeatable)
    #[arg(short, long = "source", value_name = "URL")]
    pub sources: Vec<String>,

    /// Label for the --source at the same position (repeatable; defaults to "List N")
    #[arg(short, long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    /// JSON or YAML request file: `{sources: [{url, name}]}` or `{url}`
    #[arg(short, long, value_name = "FILE", conflicts_with = "sources")]
    pub request: Option<PathBuf>,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "TCG_SCRAPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    pub run_timeout_secs: Option<u64>,

    /// Maximum simultaneous list fetches
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Minimum milliseconds between fetch starts on one slot
    #[arg(long)]
    pub min_request_interval_ms: Option<u64>,

    /// Retries for transient fetch failures
    #[arg(long)]
    pub retries: Option<usize>,

    /// Origin and path prefix that source URLs must start with
    #[arg(long, env = "TCG_SCRAPE_ACCEPTED_PREFIX")]
    pub accepted_prefix: Option<String>,

    /// Fill missing rarity, image and group from the TCGplayer catalog
    #[arg(long)]
    pub enrich: bool,

    /// Catalog mirror base URL used by --enrich
    #[arg(long, env = "TCGCSV_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub catalog_url: String,

    /// Directory for cached catalog responses (no disk cache when omitted)
    #[arg(long, value_name = "DIR", env = "TCG_SCRAPE_CATALOG_CACHE")]
    pub catalog_cache: Option<PathBuf>,

    /// Hours a cached catalog response stays fresh
    #[arg(long, default_value_t = 168)]
    pub catalog_cache_ttl_hours: u64,

    /// Keep cards whose name contains this text
    #[arg(long)]
    pub search: Option<String>,

    /// Keep cards from these sets (repeatable)
    #[arg(long = "set", value_name = "SET")]
    pub sets: Vec<String>,

    /// Keep cards of these rarities (repeatable)
    #[arg(long = "rarity", value_name = "RARITY")]
    pub rarities: Vec<String>,

    /// Keep cards of these catalog groups (repeatable)
    #[arg(long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,

    /// Keep cards from these source labels (repeatable)
    #[arg(long = "from", value_name = "LABEL")]
    pub from_sources: Vec<String>,

    /// Log card counts per value of this key
    #[arg(long, value_enum)]
    pub counts: Option<GroupingKey>,

    /// Sort cards by name instead of source order
    #[arg(long)]
    pub sort: bool,

    /// Directory for the JSON result (stdout when omitted)
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    /// Sources given with `--source`/`--label`.
    pub fn flag_sources(&self) -> Vec<SourceDescriptor> {
        SourceDescriptor::from_pairs(
            self.sources
                .iter()
                .enumerate()
                .map(|(i, url)| (url.clone(), self.labels.get(i).cloned())),
        )
    }

    /// Overlay command-line values onto options loaded from file.
    pub fn apply_overrides(&self, options: &mut PipelineOptions) {
        if let Some(v) = self.fetch_timeout_secs {
            options.fetch_timeout_secs = v;
        }
        if let Some(v) = self.run_timeout_secs {
            options.run_timeout_secs = Some(v);
        }
        if let Some(v) = self.max_concurrency {
            options.max_concurrency = v;
        }
        if let Some(v) = self.min_request_interval_ms {
            options.min_request_interval_ms = v;
        }
        if let Some(v) = self.retries {
            options.retries = v;
        }
        if let Some(v) = &self.accepted_prefix {
            options.accepted_prefix = v.clone();
        }
    }

    /// Disk cache for catalog responses, when `--catalog-cache` is given.
    pub fn catalog_cache(&self) -> Option<DiskCache> {
        self.catalog_cache.as_ref().map(|dir| {
            DiskCache::new(
                dir.clone(),
                Duration::from_secs(self.catalog_cache_ttl_hours * 60 * 60),
            )
        })
    }

    /// Filter built from `--search`, `--set`, `--rarity`, `--group` and `--from`.
    pub fn criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::new()
            .select(GroupingKey::SetName, self.sets.iter().cloned())
            .select(GroupingKey::Rarity, self.rarities.iter().cloned())
            .select(GroupingKey::GroupName, self.groups.iter().cloned())
            .select(GroupingKey::SourceName, self.from_sources.iter().cloned());
        if let Some(term) = &self.search {
            criteria = criteria.search(term.as_str());
        }
        criteria
    }
}
