//! Data models for scrape requests, extracted entries and unified card records.
//!
//! - [`SourceDescriptor`]: one list page to scrape (URL + label)
//! - [`ScrapeRequest`]: the request body form accepted from files or callers
//! - [`RawPage`]: fetched page content, owned until extraction finishes
//! - [`NeutralRecord`]: one extracted entry with its raw attribute names
//! - [`CardRecord`]: one card in the unified schema
//! - [`SourceResult`] / [`PipelineResult`]: per-source and per-run outcomes

use crate::error::SourceError;
use crate::normalize::Field;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One list page to scrape, identified by URL and display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub url: String,
    pub label: String,
}

impl SourceDescriptor {
    /// Create a descriptor with the label taken as given.
    ///
    /// Labels are not checked here. [`SourceDescriptor::from_pairs`] and
    /// [`SourceDescriptor::with_unique_labels`] fill blanks and resolve
    /// repeats; the pipeline applies the latter to every request.
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }

    /// Build descriptors from `(url, optional label)` pairs.
    ///
    /// Missing or blank labels become `"List N"` where N is the 1-based
    /// position in the request. Repeated labels get a ` (2)`, ` (3)`, ...
    /// suffix so each source keeps its own entry in the error map.
    pub fn from_pairs<I, U>(pairs: I) -> Vec<SourceDescriptor>
    where
        I: IntoIterator<Item = (U, Option<String>)>,
        U: Into<String>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        pairs
            .into_iter()
            .enumerate()
            .map(|(i, (url, label))| {
                let base = label
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| format!("List {}", i + 1));

                let mut label = base.clone();
                let mut n = 2;
                while !seen.insert(label.clone()) {
                    label = format!("{base} ({n})");
                    n += 1;
                }
                SourceDescriptor::new(url, label)
            })
            .collect()
    }

    /// Re-label already built descriptors by the same rules as
    /// [`SourceDescriptor::from_pairs`].
    ///
    /// # Arguments
    ///
    /// * `sources` - Descriptors in request order, labels possibly blank or repeated
    ///
    /// # Returns
    ///
    /// The same sources in the same order, each with a non-blank label that
    /// no other source of the request shares.
    pub fn with_unique_labels(sources: Vec<SourceDescriptor>) -> Vec<SourceDescriptor> {
        Self::from_pairs(sources.into_iter().map(|s| (s.url, Some(s.label))))
    }
}

/// One source entry of a [`ScrapeRequest`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "name")]
    pub label: Option<String>,
}

/// Request body accepted by the pipeline front ends.
///
/// ```json
/// { "sources": [ { "url": "https://mytcgcollection.com/...", "name": "Binder" } ] }
/// ```
///
/// The older single-URL form `{ "url": "..." }` is still accepted and
/// becomes one source labelled `"List 1"`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ScrapeRequest {
    /// Turn the request into labelled descriptors in request order.
    ///
    /// # Returns
    ///
    /// One descriptor per `sources` entry with labels made unique, or a
    /// single `"List 1"` descriptor for the legacy `url` form. A request
    /// with neither yields an empty list, which the pipeline rejects.
    pub fn into_sources(self) -> Vec<SourceDescriptor> {
        if self.sources.is_empty() {
            if let Some(url) = self.url.filter(|u| !u.trim().is_empty()) {
                return SourceDescriptor::from_pairs([(url, Some("List 1".to_string()))]);
            }
        }
        SourceDescriptor::from_pairs(self.sources.into_iter().map(|s| (s.url, s.label)))
    }
}

/// Fetched page content for one source.
#[derive(Debug)]
pub struct RawPage {
    pub source: SourceDescriptor,
    pub body: String,
}

/// An extracted card entry before normalization.
///
/// Holds the identifying name plus every other attribute the layout found,
/// keyed by the page's own attribute names. A record cannot exist without a
/// non-blank name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeutralRecord {
    name: String,
    attributes: BTreeMap<String, String>,
}

impl NeutralRecord {
    /// Pick the name out of raw attributes.
    ///
    /// The first attribute whose key names the card (see
    /// [`Field::for_key`]) with a non-blank value becomes the name. Returns
    /// `None` when no such attribute exists.
    pub fn identify(mut attributes: BTreeMap<String, String>) -> Option<Self> {
        let key = attributes
            .iter()
            .find(|(k, v)| Field::for_key(k) == Some(Field::Name) && !v.trim().is_empty())
            .map(|(k, _)| k.clone())?;
        let name = attributes.remove(&key)?;
        Some(Self {
            name: name.trim().to_string(),
            attributes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One card in the unified schema.
///
/// `name` is always present. Every other field is absent when the source
/// did not provide it, and absent fields are left out of the JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CardRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_url: Option<String>,
    /// Collector number, kept for catalog lookups only.
    #[serde(skip)]
    pub number: Option<String>,
}

impl CardRecord {
    /// Composite identity used for de-duplication.
    pub fn dedupe_key(&self) -> (&str, Option<&str>, Option<&str>) {
        (
            self.name.as_str(),
            self.set_name.as_deref(),
            self.source_name.as_deref(),
        )
    }
}

/// Cards produced by one successful source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCards {
    pub cards: Vec<CardRecord>,
    /// Entries on the page that were dropped for lacking a name.
    pub skipped: usize,
}

/// Terminal outcome of one source: cards or an error, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResult {
    pub label: String,
    pub outcome: Result<SourceCards, SourceError>,
}

impl SourceResult {
    pub fn success(label: impl Into<String>, cards: SourceCards) -> Self {
        Self {
            label: label.into(),
            outcome: Ok(cards),
        }
    }

    pub fn failure(label: impl Into<String>, error: SourceError) -> Self {
        Self {
            label: label.into(),
            outcome: Err(error),
        }
    }
}

/// Consolidated result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub cards: Vec<CardRecord>,
    /// Error description per failed source label.
    pub errors: BTreeMap<String, String>,
}

impl PipelineResult {
    /// Failure lines in the `"<label>: <reason>"` form shown to users.
    pub fn error_lines(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|(label, msg)| format!("{label}: {msg}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_labels() {
        let sources = SourceDescriptor::from_pairs([
            ("https://a", None),
            ("https://b", Some("Binder".to_string())),
            ("https://c", Some("   ".to_string())),
        ]);
        let labels: Vec<_> = sources.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["List 1", "Binder", "List 3"]);
    }

    #[test]
    fn test_repeated_labels_made_unique() {
        let sources = SourceDescriptor::from_pairs([
            ("https://a", Some("Main".to_string())),
            ("https://b", Some("Main".to_string())),
            ("https://c", Some("Main".to_string())),
        ]);
        let labels: Vec<_> = sources.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Main", "Main (2)", "Main (3)"]);
    }

    #[test]
    fn test_unique_labels_on_built_descriptors() {
        let sources = SourceDescriptor::with_unique_labels(vec![
            SourceDescriptor::new("https://a", "X"),
            SourceDescriptor::new("https://b", ""),
            SourceDescriptor::new("https://c", "X"),
        ]);
        let labels: Vec<_> = sources.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["X", "List 2", "X (2)"]);
        assert_eq!(sources[2].url, "https://c");
    }

    #[test]
    fn test_request_legacy_url() {
        let req: ScrapeRequest =
            serde_json::from_str(r#"{"url": "https://mytcgcollection.com/l/1"}"#).unwrap();
        let sources = req.into_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].label, "List 1");
        assert_eq!(sources[0].url, "https://mytcgcollection.com/l/1");
    }

    #[test]
    fn test_request_sources_with_name_alias() {
        let req: ScrapeRequest = serde_json::from_str(
            r#"{"sources": [{"url": "https://x/1", "name": "Trade"}, {"url": "https://x/2"}]}"#,
        )
        .unwrap();
        let sources = req.into_sources();
        assert_eq!(sources[0].label, "Trade");
        assert_eq!(sources[1].label, "List 2");
    }

    #[test]
    fn test_empty_request_has_no_sources() {
        let req: ScrapeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.into_sources().is_empty());
    }

    #[test]
    fn test_identify_requires_name() {
        let mut attrs = BTreeMap::new();
        attrs.insert("data-number".to_string(), "12".to_string());
        assert!(NeutralRecord::identify(attrs.clone()).is_none());

        attrs.insert("data-name".to_string(), "  Pikachu ".to_string());
        let record = NeutralRecord::identify(attrs).unwrap();
        assert_eq!(record.name(), "Pikachu");
        assert_eq!(record.attributes().collect::<Vec<_>>(), vec![("data-number", "12")]);
    }

    #[test]
    fn test_card_record_omits_absent_fields() {
        let card = CardRecord {
            name: "Eevee".into(),
            source_name: Some("List 1".into()),
            number: Some("101".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Eevee", "source_name": "List 1"}));
    }

    #[test]
    fn test_pipeline_result_error_lines() {
        let mut result = PipelineResult::default();
        result
            .errors
            .insert("List 2".into(), "invalid URL: x (bad)".into());
        assert_eq!(result.error_lines(), vec!["List 2: invalid URL: x (bad)"]);
    }
}
