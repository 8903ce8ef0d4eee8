//! Field normalization onto the unified card schema.
//!
//! Each page layout names its attributes differently (`data-name`,
//! `Card Name`, `Expansion`, `href`, ...). [`Field::for_key`] is the single
//! closed alias table that decides which unified field an attribute feeds;
//! anything it does not know is dropped so the output schema never drifts.
//!
//! Normalization is pure and cannot fail: a malformed value simply leaves
//! its field absent.

use crate::models::{CardRecord, NeutralRecord, SourceDescriptor};
use url::Url;

/// Unified schema fields an extracted attribute can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    SetName,
    Rarity,
    GroupName,
    SourceName,
    ImageUrl,
    CardUrl,
    Number,
}

impl Field {
    /// Look up the unified field for a raw attribute name.
    pub fn for_key(key: &str) -> Option<Field> {
        let field = match canonical_key(key).as_str() {
            "name" | "card name" | "card" | "title" | "nom" => Field::Name,
            "set" | "set name" | "setname" | "expansion" | "series" | "edition" => Field::SetName,
            "rarity" | "rarete" | "rareté" | "card rarity" => Field::Rarity,
            "group" | "group name" | "tcg group" | "product line" => Field::GroupName,
            "source" | "source name" | "list" => Field::SourceName,
            "image" | "image url" | "img" | "src" | "picture" | "thumbnail" => Field::ImageUrl,
            "href" | "link" | "url" | "card url" => Field::CardUrl,
            "number" | "card number" | "collector number" | "no" | "no." | "#" => Field::Number,
            _ => return None,
        };
        Some(field)
    }
}

/// Lower-case, drop a `data-` prefix, read `_`/`-` as spaces, collapse runs.
fn canonical_key(key: &str) -> String {
    let lower = key.trim().to_lowercase();
    let stripped = lower.strip_prefix("data-").unwrap_or(&lower);
    stripped
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapse internal whitespace; blank becomes absent.
fn clean(value: &str) -> Option<String> {
    let joined = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Resolve a link against the page it came from. Only http(s) survives.
fn resolve_url(base: Option<&Url>, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let url = match Url::parse(value) {
        Ok(url) => url,
        Err(_) => base?.join(value).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Misspellings the source site is known to publish.
const SET_NAME_FIXES: &[(&str, &str)] = &[("Accended", "Ascended")];

fn fix_set_name(set_name: String) -> String {
    SET_NAME_FIXES
        .iter()
        .fold(set_name, |acc, (wrong, right)| {
            if acc.contains(wrong) {
                acc.replace(wrong, right)
            } else {
                acc
            }
        })
}

/// Map one extracted record onto the unified schema.
///
/// The first attribute feeding a field wins. `source_name` always comes
/// from the descriptor's label, whatever the page says.
pub fn normalize(record: &NeutralRecord, source: &SourceDescriptor) -> CardRecord {
    let base = Url::parse(&source.url).ok();
    let mut card = CardRecord {
        name: clean(record.name()).unwrap_or_else(|| record.name().to_string()),
        ..Default::default()
    };

    for (key, value) in record.attributes() {
        let Some(field) = Field::for_key(key) else {
            continue;
        };
        let slot = match field {
            // Identified by the extractor; the label is authoritative.
            Field::Name | Field::SourceName => continue,
            Field::SetName => &mut card.set_name,
            Field::Rarity => &mut card.rarity,
            Field::GroupName => &mut card.group_name,
            Field::ImageUrl => &mut card.image_url,
            Field::CardUrl => &mut card.card_url,
            Field::Number => &mut card.number,
        };
        if slot.is_some() {
            continue;
        }
        *slot = match field {
            Field::ImageUrl | Field::CardUrl => resolve_url(base.as_ref(), value),
            Field::SetName => clean(value).map(fix_set_name),
            _ => clean(value),
        };
    }

    card.source_name = Some(source.label.clone());
    card
}
