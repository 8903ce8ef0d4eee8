//! Client-side filtering and grouping over aggregated cards.
//!
//! Filter state is one immutable [`FilterCriteria`] value handed to a pure
//! [`FilterCriteria::apply`]. Grouping goes through the closed
//! [`GroupingKey`] set, each key with a typed accessor.

use crate::models::CardRecord;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Card attributes that cards can be grouped and filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    SetName,
    Rarity,
    GroupName,
    SourceName,
}

impl GroupingKey {
    pub const ALL: [GroupingKey; 4] = [
        GroupingKey::SetName,
        GroupingKey::Rarity,
        GroupingKey::GroupName,
        GroupingKey::SourceName,
    ];

    pub fn value<'a>(&self, card: &'a CardRecord) -> Option<&'a str> {
        match self {
            GroupingKey::SetName => card.set_name.as_deref(),
            GroupingKey::Rarity => card.rarity.as_deref(),
            GroupingKey::GroupName => card.group_name.as_deref(),
            GroupingKey::SourceName => card.source_name.as_deref(),
        }
    }
}

/// Search term plus selected values per grouping key.
///
/// A card passes when its name contains the search term (case-insensitive)
/// and, for every key with a non-empty selection, its value is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    search: Option<String>,
    selected: BTreeMap<GroupingKey, BTreeSet<String>>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into().trim().to_lowercase();
        self.search = (!term.is_empty()).then_some(term);
        self
    }

    pub fn select<I, S>(mut self, key: GroupingKey, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected
            .entry(key)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.selected.values().all(BTreeSet::is_empty)
    }

    pub fn matches(&self, card: &CardRecord) -> bool {
        if let Some(term) = &self.search {
            if !card.name.to_lowercase().contains(term.as_str()) {
                return false;
            }
        }
        self.selected.iter().all(|(key, values)| {
            values.is_empty() || key.value(card).is_some_and(|v| values.contains(v))
        })
    }

    pub fn apply<'a>(&self, cards: &'a [CardRecord]) -> Vec<&'a CardRecord> {
        cards.iter().filter(|card| self.matches(card)).collect()
    }
}

/// Number of cards per value of `key`. Cards without a value are not counted.
pub fn category_counts(cards: &[CardRecord], key: GroupingKey) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in cards.iter().filter_map(|card| key.value(card)) {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Cards ordered by name (case-insensitive), stable for equal names.
pub fn sorted_by_name<'a>(cards: impl IntoIterator<Item = &'a CardRecord>) -> Vec<&'a CardRecord> {
    let mut sorted: Vec<&CardRecord> = cards.into_iter().collect();
    sorted.sort_by_cached_key(|card| card.name.to_lowercase());
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(name: &str, set: Option<&str>, rarity: Option<&str>, source: &str) -> CardRecord {
        CardRecord {
            name: name.into(),
            set_name: set.map(Into::into),
            rarity: rarity.map(Into::into),
            source_name: Some(source.into()),
            ..Default::default()
        }
    }

    fn cards() -> Vec<CardRecord> {
        vec![
            card("Pikachu", Some("151"), Some("Common"), "A"),
            card("Raichu", Some("151"), Some("Rare"), "A"),
            card("pichu", Some("Base"), None, "B"),
        ]
    }

    #[test]
    fn test_empty_criteria_pass_everything() {
        let cards = cards();
        let criteria = FilterCriteria::new().search("   ");
        assert!(criteria.is_empty());
        assert_eq!(criteria.apply(&cards).len(), 3);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let cards = cards();
        let hits = FilterCriteria::new().search("CHU").apply(&cards);
        assert_eq!(hits.len(), 3);
        let hits = FilterCriteria::new().search("rai").apply(&cards);
        assert_eq!(hits[0].name, "Raichu");
    }

    #[test]
    fn test_selection_requires_value() {
        let cards = cards();
        let hits = FilterCriteria::new()
            .select(GroupingKey::Rarity, ["Common", "Rare"])
            .apply(&cards);
        let names: Vec<_> = hits.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Pikachu", "Raichu"]);
    }

    #[test]
    fn test_selections_combine() {
        let cards = cards();
        let hits = FilterCriteria::new()
            .select(GroupingKey::SetName, ["151"])
            .select(GroupingKey::Rarity, ["Rare"])
            .apply(&cards);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Raichu");
    }

    #[test]
    fn test_category_counts() {
        let counts = category_counts(&cards(), GroupingKey::SetName);
        assert_eq!(counts.get("151"), Some(&2));
        assert_eq!(counts.get("Base"), Some(&1));
        let counts = category_counts(&cards(), GroupingKey::Rarity);
        assert_eq!(counts.values().sum::<usize>(), 2);
    }

    #[test]
    fn test_sorted_by_name() {
        let cards = cards();
        let names: Vec<_> = sorted_by_name(&cards).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["pichu", "Pikachu", "Raichu"]);
    }
}
