//! # tcg_scrape
//!
//! Command-line front end for the card list pipeline: scrapes one or more
//! list pages, optionally fills gaps from the TCGplayer catalog mirror,
//! filters the merged collection and writes it as JSON.
//!
//! ## Usage
//!
//! ```sh
//! tcg_scrape -s https://mytcgcollection.com/list/abc -o ./json
//! tcg_scrape -r request.yaml --enrich --counts rarity --pretty
//! ```
//!
//! Logs go to stderr so the JSON on stdout stays clean.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tcg_scrape::catalog::Enricher;
use tcg_scrape::catalog::tcgcsv::{POKEMON_CATEGORY_ID, TcgCsvClient};
use tcg_scrape::cli::Cli;
use tcg_scrape::filter::{category_counts, sorted_by_name};
use tcg_scrape::outputs::json;
use tcg_scrape::utils::{ensure_writable_dir, until_signal};
use tcg_scrape::{Pipeline, PipelineOptions, ScrapeRequest, SourceDescriptor};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tcg_scrape starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.request, sources = args.sources.len(), "Parsed CLI arguments");

    // --- Options ---
    let mut options = match &args.config {
        Some(path) => PipelineOptions::load(path).map_err(|e| {
            error!(error = %e, "Failed to load config");
            e
        })?,
        None => PipelineOptions::default(),
    };
    args.apply_overrides(&mut options);

    // --- Sources ---
    let sources = match &args.request {
        Some(path) => load_request(path).await?,
        None => args.flag_sources(),
    };
    info!(count = sources.len(), "Sources requested");

    // --- Scrape ---
    let pipeline = Pipeline::http(options)?;
    let mut result = match pipeline
        .run_until(sources, until_signal(tokio::signal::ctrl_c()))
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Scrape run failed");
            return Err(e.into());
        }
    };
    for line in result.error_lines() {
        warn!("{line}");
    }
    info!(cards = result.cards.len(), failed = result.errors.len(), "Scrape finished");

    // --- Catalog enrichment ---
    if args.enrich {
        let client = reqwest::Client::builder()
            .timeout(pipeline.options().fetch_timeout())
            .user_agent(pipeline.options().user_agent.clone())
            .build()?;
        let mut catalog = TcgCsvClient::new(client, args.catalog_url.clone(), POKEMON_CATEGORY_ID);
        if let Some(cache) = args.catalog_cache() {
            if let Err(e) = cache.clear_expired().await {
                warn!(dir = %cache.dir().display(), error = %e, "Failed to clear expired catalog cache");
            }
            catalog = catalog.with_cache(cache);
        }
        match Enricher::connect(catalog).await {
            Ok(enricher) => {
                let cards = std::mem::take(&mut result.cards);
                result.cards = enricher.enrich(cards).await;
            }
            Err(e) => warn!(error = %e, "Catalog unavailable; continuing without enrichment"),
        }
    }

    // --- Filter ---
    let criteria = args.criteria();
    if !criteria.is_empty() {
        let before = result.cards.len();
        result.cards = criteria.apply(&result.cards).into_iter().cloned().collect();
        info!(before, after = result.cards.len(), "Applied filters");
    }
    if args.sort {
        result.cards = sorted_by_name(&result.cards).into_iter().cloned().collect();
    }
    if let Some(key) = args.counts {
        for (value, count) in category_counts(&result.cards, key) {
            info!(key = ?key, %value, count, "Category count");
        }
    }

    // --- Output ---
    match &args.output_dir {
        Some(dir) => {
            if let Err(e) = ensure_writable_dir(dir).await {
                error!(path = %dir, error = %e, "Output directory not writable");
                return Err(e);
            }
            json::write_result(&result, dir, args.pretty).await?;
        }
        None => println!("{}", json::to_json(&result, args.pretty)?),
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        "Execution time: {:.2?}", elapsed
    );

    Ok(())
}

/// Read a JSON or YAML request file into labelled sources.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
async fn load_request(path: &Path) -> Result<Vec<SourceDescriptor>, Box<dyn Error>> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        error!(error = %e, "Failed to read request file");
        e
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let request: ScrapeRequest = if is_json {
        serde_json::from_str(&text)?
    } else {
        serde_yaml::from_str(&text)?
    };
    let sources = request.into_sources();
    debug!(sources = sources.len(), "Loaded request file");
    Ok(sources)
}
