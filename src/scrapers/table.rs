//! Tabular card lists.
//!
//! Exported and printable lists render one card per table row under a
//! header row. A table counts as a card list when one of its header cells
//! names the card (`Name`, `Card Name`, ...). Rows are keyed by header text.

use super::{element_text, PageLayout, RawEntry};
use crate::normalize::Field;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("valid table selector"));
static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("valid row selector"));
static HEADER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th").expect("valid header selector"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("valid cell selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid link selector"));
static IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src]").expect("valid image selector"));

/// Any `<table>` with a card-name column.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableList;

/// Header texts of the first row that has `<th>` cells.
fn header_row(table: ElementRef<'_>) -> Option<Vec<String>> {
    table
        .select(&ROW_SELECTOR)
        .map(|row| row.select(&HEADER_SELECTOR).map(element_text).collect::<Vec<_>>())
        .find(|headers| !headers.is_empty())
}

fn card_table(table: ElementRef<'_>) -> Option<(ElementRef<'_>, Vec<String>)> {
    let headers = header_row(table)?;
    headers
        .iter()
        .any(|h| Field::for_key(h) == Some(Field::Name))
        .then_some((table, headers))
}

fn row_attributes(row: ElementRef<'_>, headers: &[String]) -> RawEntry {
    let mut entry: RawEntry = headers
        .iter()
        .zip(row.select(&CELL_SELECTOR))
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, cell)| (header.clone(), element_text(cell)))
        .collect();

    if let Some(href) = row
        .select(&LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
    {
        entry.entry("href".to_string()).or_insert_with(|| href.to_string());
    }
    if let Some(src) = row
        .select(&IMAGE_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
    {
        entry.entry("image".to_string()).or_insert_with(|| src.to_string());
    }
    entry
}

impl PageLayout for TableList {
    fn name(&self) -> &'static str {
        "table"
    }

    fn recognizes(&self, document: &Html) -> bool {
        document.select(&TABLE_SELECTOR).any(|t| card_table(t).is_some())
    }

    fn entries<'a>(&'a self, document: &'a Html) -> Box<dyn Iterator<Item = RawEntry> + 'a> {
        Box::new(
            document
                .select(&TABLE_SELECTOR)
                .filter_map(card_table)
                .flat_map(|(table, headers)| {
                    table
                        .select(&ROW_SELECTOR)
                        .filter(|row| row.select(&CELL_SELECTOR).next().is_some())
                        .map(move |row| row_attributes(row, &headers))
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <table id="totals"><tr><th>Total</th></tr><tr><td>3</td></tr></table>
        <table>
          <thead><tr><th>Card Name</th><th>Expansion</th><th>Rarity</th><th></th></tr></thead>
          <tbody>
            <tr><td><a href="/card/1">Bulbasaur</a></td><td>151</td><td>Common</td><td>x</td></tr>
            <tr><td></td><td>151</td><td>Common</td></tr>
            <tr><td>Ivysaur</td><td>151</td></tr>
          </tbody>
        </table>
    "#;

    #[test]
    fn test_requires_name_column() {
        let without = Html::parse_document("<table><tr><th>Total</th></tr><tr><td>1</td></tr></table>");
        assert!(!TableList.recognizes(&without));
        assert!(TableList.recognizes(&Html::parse_document(PAGE)));
    }

    #[test]
    fn test_rows_keyed_by_header() {
        let document = Html::parse_document(PAGE);
        let entries: Vec<RawEntry> = TableList.entries(&document).collect();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0]["Card Name"], "Bulbasaur");
        assert_eq!(entries[0]["Expansion"], "151");
        assert_eq!(entries[0]["Rarity"], "Common");
        assert_eq!(entries[0]["href"], "/card/1");
        assert_eq!(entries[1]["Card Name"], "");
        assert!(!entries[2].contains_key("Rarity"));
    }
}
