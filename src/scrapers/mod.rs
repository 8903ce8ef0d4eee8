//! Page layouts and the record extractor.
//!
//! A page is recognized by a repeated container pattern in its markup. Each
//! supported pattern is a [`PageLayout`]; the [`Extractor`] tries its
//! layouts in order and extracts entries with the first one that recognizes
//! the page.
//!
//! # Supported Layouts
//!
//! | Layout | Module | Container | Notes |
//! |--------|--------|-----------|-------|
//! | mytcgcollection | [`mytcgcollection`] | `div[data-cardid]` | Collection/list grid |
//! | table | [`table`] | `<table>` with a name column | Exported or printable lists |
//!
//! # Common Patterns
//!
//! Each layout module exports a unit struct implementing [`PageLayout`].
//! Layouts report raw attribute names exactly as the page spells them;
//! mapping onto the unified schema is left to [`crate::normalize`].

pub mod mytcgcollection;
pub mod table;

use crate::error::SourceError;
use crate::models::NeutralRecord;
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use tracing::debug;

/// Raw attributes of one container entry, keyed as the page names them.
pub type RawEntry = BTreeMap<String, String>;

/// One recognizable page structure.
pub trait PageLayout: Send + Sync {
    /// Short layout name used in logs.
    fn name(&self) -> &'static str;

    /// Whether the page carries this layout's repeated container.
    fn recognizes(&self, document: &Html) -> bool;

    /// Lazily walk every container entry on the page.
    fn entries<'a>(&'a self, document: &'a Html) -> Box<dyn Iterator<Item = RawEntry> + 'a>;
}

/// Runs the first matching [`PageLayout`] over a parsed page.
pub struct Extractor {
    layouts: Vec<Box<dyn PageLayout>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_layouts(vec![
            Box::new(mytcgcollection::MyTcgCollection),
            Box::new(table::TableList),
        ])
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field(
                "layouts",
                &self.layouts.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Extractor {
    pub fn with_layouts(layouts: Vec<Box<dyn PageLayout>>) -> Self {
        Self { layouts }
    }

    /// Start extracting records from a parsed page.
    ///
    /// Fails with [`SourceError::Extract`] when no layout recognizes the
    /// page. Entries without a name are skipped by the returned iterator
    /// and counted in [`Entries::skipped`].
    pub fn extract<'a>(&'a self, document: &'a Html) -> Result<Entries<'a>, SourceError> {
        let layout = self
            .layouts
            .iter()
            .find(|layout| layout.recognizes(document))
            .ok_or_else(|| SourceError::Extract("no known card list layout found".to_string()))?;

        debug!(layout = layout.name(), "Recognized page layout");
        Ok(Entries {
            layout: layout.name(),
            inner: layout.entries(document),
            skipped: 0,
        })
    }
}

/// Lazy sequence of identified records from one page.
pub struct Entries<'a> {
    layout: &'static str,
    inner: Box<dyn Iterator<Item = RawEntry> + 'a>,
    skipped: usize,
}

impl Entries<'_> {
    pub fn layout(&self) -> &'static str {
        self.layout
    }

    /// Entries dropped so far for lacking a name.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for Entries<'_> {
    type Item = NeutralRecord;

    fn next(&mut self) -> Option<NeutralRecord> {
        loop {
            let raw = self.inner.next()?;
            match NeutralRecord::identify(raw) {
                Some(record) => return Some(record),
                None => {
                    self.skipped += 1;
                    debug!(layout = self.layout, "Skipping entry without a name");
                }
            }
        }
    }
}

/// Visible text of an element with whitespace runs collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
