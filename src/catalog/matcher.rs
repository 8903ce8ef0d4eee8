//! Matching scraped cards to catalog products.
//!
//! Everything here is pure: text folding, product indexing by collector
//! number, and resolving a site set name to a catalog group.

use super::tcgcsv::{Group, Product};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

static SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(vmax|vstar|ex|gx|v)\b").expect("valid suffix regex"));

/// Lower-case, fold common accents, keep only `[a-z0-9 ]`, collapse spaces.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Mechanic suffixes (`ex`, `V`, `VMAX`, ...) present in a card name.
///
/// Two names only match when they carry the same suffixes, so `Pikachu`
/// never matches `Pikachu ex`.
pub fn card_suffixes(name: &str) -> BTreeSet<String> {
    SUFFIX_RE
        .find_iter(&name.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `"025/165"` → `"25"`; blank or all zeros → `"0"`.
pub fn normalize_number(number: &str) -> String {
    let head = number.split('/').next().unwrap_or_default().trim();
    let trimmed = head.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Products of one group keyed by normalized collector number.
#[derive(Debug, Default)]
pub struct ProductIndex {
    by_number: HashMap<String, Vec<Product>>,
}

impl ProductIndex {
    pub fn build(products: &[Product]) -> Self {
        let mut by_number: HashMap<String, Vec<Product>> = HashMap::new();
        for product in products {
            if let Some(number) = product.extended("Number") {
                by_number
                    .entry(normalize_number(number))
                    .or_default()
                    .push(product.clone());
            }
        }
        Self { by_number }
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    /// First product with the same number, same suffixes, and a name that
    /// contains or is contained in the card name.
    pub fn find(&self, name: &str, number: &str) -> Option<&Product> {
        let wanted = normalize_text(name);
        let suffixes = card_suffixes(name);

        self.by_number
            .get(&normalize_number(number))?
            .iter()
            .find(|product| {
                [product.clean_name.as_deref(), Some(product.name.as_str())]
                    .into_iter()
                    .flatten()
                    .filter(|candidate| !candidate.is_empty())
                    .any(|candidate| {
                        if card_suffixes(candidate) != suffixes {
                            return false;
                        }
                        let have = normalize_text(candidate);
                        have.contains(&wanted) || wanted.contains(&have)
                    })
            })
    }
}

/// Spellings of a set name with `&` removed, spelled out, or abbreviated.
fn ampersand_variants(set_name: &str) -> Vec<String> {
    if !set_name.contains('&') {
        return Vec::new();
    }
    let mut variants = vec![
        set_name.replace("& ", "").replace('&', ""),
        set_name.replace('&', "and"),
    ];
    let abbreviation: String = set_name
        .replace('&', "")
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_uppercase)
        .collect();
    if !abbreviation.is_empty() {
        variants.push(abbreviation);
    }
    variants
}

/// Catalog groups in the order the catalog lists them.
#[derive(Debug, Clone, Default)]
pub struct GroupDirectory {
    groups: Vec<Group>,
}

impl GroupDirectory {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn name_of(&self, group_id: u64) -> Option<&str> {
        self.groups
            .iter()
            .find(|g| g.group_id == group_id)
            .map(|g| g.name.as_str())
    }

    fn exact(&self, name: &str) -> Option<u64> {
        self.groups.iter().find(|g| g.name == name).map(|g| g.group_id)
    }

    /// Resolve a site set name to a catalog group.
    ///
    /// Tries an exact name, then substring overlap in either direction, then
    /// the `&` variants of the name.
    pub fn resolve(&self, set_name: &str) -> Option<u64> {
        if let Some(id) = self.exact(set_name) {
            return Some(id);
        }

        let lower = set_name.to_lowercase();
        if let Some(group) = self.groups.iter().find(|g| {
            let name = g.name.to_lowercase();
            name.contains(&lower) || lower.contains(&name)
        }) {
            return Some(group.group_id);
        }

        for variant in ampersand_variants(set_name) {
            if let Some(id) = self.exact(&variant) {
                return Some(id);
            }
            let vlow = variant.to_lowercase();
            if let Some(group) = self.groups.iter().find(|g| {
                let name = g.name.to_lowercase();
                name.contains(&vlow) || vlow.contains(&name)
            }) {
                return Some(group.group_id);
            }
        }
        None
    }

    /// Groups with "promo" in their name.
    pub fn promos(&self) -> impl Iterator<Item = &Group> {
        self.groups
            .iter()
            .filter(|g| g.name.to_lowercase().contains("promo"))
    }

    /// Other groups whose name contains the set name or one of its variants.
    ///
    /// Subsets (trainer galleries, shiny vaults) live in their own groups.
    pub fn related(&self, set_name: &str, exclude: u64) -> impl Iterator<Item = &Group> {
        let mut variants = vec![set_name.to_lowercase()];
        variants.extend(ampersand_variants(set_name).iter().map(|v| v.to_lowercase()));
        self.groups.iter().filter(move |g| {
            let name = g.name.to_lowercase();
            g.group_id != exclude && variants.iter().any(|v| name.contains(v.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tcgcsv::ExtendedData;

    fn product(name: &str, number: &str) -> Product {
        Product {
            product_id: 1,
            name: name.into(),
            clean_name: Some(name.replace(['-', '\''], " ")),
            image_url: None,
            extended_data: vec![ExtendedData {
                name: "Number".into(),
                value: number.into(),
            }],
        }
    }

    fn group(id: u64, name: &str) -> Group {
        Group {
            group_id: id,
            name: name.into(),
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Pokémon  Card!"), "pokemon card");
        assert_eq!(normalize_text("Farfetch'd"), "farfetchd");
    }

    #[test]
    fn test_card_suffixes() {
        assert!(card_suffixes("Pikachu").is_empty());
        assert_eq!(
            card_suffixes("Charizard VMAX").into_iter().collect::<Vec<_>>(),
            vec!["vmax"]
        );
        assert!(card_suffixes("Vexed Eevee").is_empty());
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("025/165"), "25");
        assert_eq!(normalize_number("000"), "0");
        assert_eq!(normalize_number("TG05"), "TG05");
    }

    #[test]
    fn test_index_matches_suffixes() {
        let index = ProductIndex::build(&[
            product("Pikachu ex", "025/165"),
            product("Pikachu", "25/165"),
        ]);
        assert_eq!(index.find("Pikachu", "025").map(|p| p.name.as_str()), Some("Pikachu"));
        assert_eq!(index.find("Pikachu ex", "25").map(|p| p.name.as_str()), Some("Pikachu ex"));
        assert!(index.find("Raichu", "25").is_none());
        assert!(index.find("Pikachu", "26").is_none());
    }

    #[test]
    fn test_group_resolution() {
        let groups = GroupDirectory::new(vec![
            group(1, "SV: Scarlet & Violet 151"),
            group(2, "SM Base Set"),
            group(3, "SWSH: Sword & Shield Promo Cards"),
            group(4, "Crown Zenith"),
            group(5, "Crown Zenith: Galarian Gallery"),
        ]);
        assert_eq!(groups.resolve("Crown Zenith"), Some(4));
        assert_eq!(groups.resolve("151"), Some(1));
        assert_eq!(groups.resolve("Sun & Moon"), Some(2));
        assert_eq!(groups.resolve("Unheard Of"), None);
        assert_eq!(groups.promos().map(|g| g.group_id).collect::<Vec<_>>(), vec![3]);
        assert_eq!(
            groups.related("Crown Zenith", 4).map(|g| g.group_id).collect::<Vec<_>>(),
            vec![5]
        );
        assert_eq!(groups.name_of(2), Some("SM Base Set"));
    }
}
