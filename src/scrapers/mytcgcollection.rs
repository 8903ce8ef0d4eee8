//! mytcgcollection.com list grid.
//!
//! Each card of a shared list is rendered as a `div[data-cardid]` tile. The
//! tile's `data-*` attributes carry the name and collector number, a header
//! paragraph holds the set name, and the tile links to `/card/...`.
//!
//! ```html
//! <div data-cardid="8812" data-name="Pikachu" data-number="025">
//!   <div class="flex justify-between mb-4"><p class="text-gray-500">151</p></div>
//!   <a href="/card/sv3pt5-25"><img src="https://..."></a>
//! </div>
//! ```

use super::{element_text, PageLayout, RawEntry};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[data-cardid]").expect("valid card selector"));
static SET_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.flex.justify-between.mb-4 p.text-gray-500").expect("valid set selector")
});
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href^='/card/']").expect("valid link selector"));
static IMAGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img").expect("valid image selector"));

/// Layout of mytcgcollection.com collection and list pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MyTcgCollection;

impl PageLayout for MyTcgCollection {
    fn name(&self) -> &'static str {
        "mytcgcollection"
    }

    fn recognizes(&self, document: &Html) -> bool {
        document.select(&CARD_SELECTOR).next().is_some()
    }

    fn entries<'a>(&'a self, document: &'a Html) -> Box<dyn Iterator<Item = RawEntry> + 'a> {
        Box::new(document.select(&CARD_SELECTOR).map(tile_attributes))
    }
}

fn tile_attributes(tile: ElementRef<'_>) -> RawEntry {
    let mut entry: RawEntry = tile
        .value()
        .attrs()
        .filter(|(name, _)| name.starts_with("data-"))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    if let Some(set) = tile.select(&SET_SELECTOR).next() {
        entry.insert("set".to_string(), element_text(set));
    }

    if let Some(href) = tile
        .select(&LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
    {
        entry.insert("href".to_string(), href.to_string());
    }

    if let Some(src) = tile
        .select(&IMAGE_SELECTOR)
        .find_map(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
    {
        entry.insert("image".to_string(), src.to_string());
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><main>
          <div data-cardid="1" data-name="Pikachu" data-number="025" data-rarity="Common">
            <div class="flex justify-between mb-4"><p class="text-gray-500"> 151 </p></div>
            <a href="/card/sv3pt5-25"><img src="https://images.example/pika.png"></a>
          </div>
          <div data-cardid="2" data-name="Mew" data-number="151">
            <a href="/card/sv3pt5-151"><img data-src="/img/mew.png"></a>
          </div>
        </main></body></html>
    "#;

    #[test]
    fn test_recognizes_grid() {
        assert!(MyTcgCollection.recognizes(&Html::parse_document(PAGE)));
        assert!(!MyTcgCollection.recognizes(&Html::parse_document("<div class='card'></div>")));
    }

    #[test]
    fn test_tile_attributes() {
        let document = Html::parse_document(PAGE);
        let entries: Vec<RawEntry> = MyTcgCollection.entries(&document).collect();
        assert_eq!(entries.len(), 2);

        let pika = &entries[0];
        assert_eq!(pika["data-name"], "Pikachu");
        assert_eq!(pika["data-number"], "025");
        assert_eq!(pika["data-rarity"], "Common");
        assert_eq!(pika["set"], "151");
        assert_eq!(pika["href"], "/card/sv3pt5-25");
        assert_eq!(pika["image"], "https://images.example/pika.png");
    }

    #[test]
    fn test_optional_parts_missing() {
        let document = Html::parse_document(PAGE);
        let entries: Vec<RawEntry> = MyTcgCollection.entries(&document).collect();
        let mew = &entries[1];
        assert!(!mew.contains_key("set"));
        assert!(!mew.contains_key("data-rarity"));
        assert_eq!(mew["image"], "/img/mew.png");
    }
}
