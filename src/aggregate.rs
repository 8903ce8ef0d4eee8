//! Merges per-source outcomes into one [`PipelineResult`].
//!
//! Outcomes may arrive in any order; each is recorded at its source's
//! position in the request, and [`Aggregator::finish`] emits cards grouped
//! by that position. Within a source, extraction order is kept.

use crate::models::{CardRecord, PipelineResult, SourceResult};
use itertools::Itertools;
use tracing::{info, warn};

/// Accumulates one outcome per source position.
#[derive(Debug)]
pub struct Aggregator {
    slots: Vec<Option<SourceResult>>,
}

impl Aggregator {
    pub fn new(source_count: usize) -> Self {
        Self {
            slots: vec![None; source_count],
        }
    }

    /// Record the terminal outcome of the source at `index`.
    ///
    /// A second outcome for the same position replaces the first.
    pub fn record(&mut self, index: usize, result: SourceResult) {
        match self.slots.get_mut(index) {
            Some(slot) => {
                if slot.replace(result).is_some() {
                    warn!(index, "Source outcome recorded twice; keeping the latest");
                }
            }
            None => warn!(index, "Outcome for unknown source position dropped"),
        }
    }

    pub fn finish(self) -> PipelineResult {
        let mut result = PipelineResult::default();
        let mut raw = 0usize;

        for (index, slot) in self.slots.into_iter().enumerate() {
            let Some(SourceResult { label, outcome }) = slot else {
                warn!(index, "Source produced no outcome");
                continue;
            };
            match outcome {
                Ok(source_cards) => {
                    raw += source_cards.cards.len();
                    result.cards.extend(source_cards.cards);
                }
                Err(e) => {
                    result.errors.insert(label, e.to_string());
                }
            }
        }

        result.cards = dedupe(result.cards);
        info!(
            raw,
            unique = result.cards.len(),
            failed_sources = result.errors.len(),
            "Aggregated source results"
        );
        result
    }
}

/// Keep the first card of each (name, set_name, source_name) key.
pub fn dedupe(cards: Vec<CardRecord>) -> Vec<CardRecord> {
    cards
        .into_iter()
        .unique_by(|card| {
            let (name, set, source) = card.dedupe_key();
            (name.to_string(), set.map(str::to_string), source.map(str::to_string))
        })
        .collect()
}

/// Aggregate outcomes already in request order.
pub fn aggregate(results: Vec<SourceResult>) -> PipelineResult {
    let mut aggregator = Aggregator::new(results.len());
    for (index, result) in results.into_iter().enumerate() {
        aggregator.record(index, result);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchFailure, SourceError};
    use crate::models::SourceCards;

    fn card(name: &str, set: Option<&str>, source: &str) -> CardRecord {
        CardRecord {
            name: name.into(),
            set_name: set.map(Into::into),
            source_name: Some(source.into()),
            ..Default::default()
        }
    }

    fn ok(label: &str, cards: Vec<CardRecord>) -> SourceResult {
        SourceResult::success(label, SourceCards { cards, skipped: 0 })
    }

    #[test]
    fn test_duplicates_within_source_collapse() {
        let result = aggregate(vec![ok(
            "A",
            vec![
                card("Pikachu", Some("151"), "A"),
                CardRecord {
                    rarity: Some("Common".into()),
                    ..card("Pikachu", Some("151"), "A")
                },
                card("Pikachu", Some("Base"), "A"),
            ],
        )]);
        assert_eq!(result.cards.len(), 2);
        assert_eq!(result.cards[0].rarity, None);
        assert_eq!(result.cards[1].set_name.as_deref(), Some("Base"));
    }

    #[test]
    fn test_same_card_two_sources_kept() {
        let result = aggregate(vec![
            ok("A", vec![card("Mew", Some("151"), "A")]),
            ok("B", vec![card("Mew", Some("151"), "B")]),
        ]);
        assert_eq!(result.cards.len(), 2);
    }

    #[test]
    fn test_order_follows_positions_not_arrival() {
        let mut aggregator = Aggregator::new(3);
        aggregator.record(2, ok("C", vec![card("c", None, "C")]));
        aggregator.record(0, ok("A", vec![card("a1", None, "A"), card("a2", None, "A")]));
        aggregator.record(1, ok("B", vec![card("b", None, "B")]));
        let names: Vec<_> = aggregator
            .finish()
            .cards
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a1", "a2", "b", "c"]);
    }

    #[test]
    fn test_failures_keyed_by_label() {
        let result = aggregate(vec![
            ok("A", vec![card("a", None, "A")]),
            SourceResult::failure("B", SourceError::Fetch(FetchFailure::Timeout)),
        ]);
        assert_eq!(result.cards.len(), 1);
        assert_eq!(result.errors.get("B").map(String::as_str), Some("fetch failed: timeout"));
    }

    #[test]
    fn test_out_of_range_record_ignored() {
        let mut aggregator = Aggregator::new(1);
        aggregator.record(5, ok("Z", vec![card("z", None, "Z")]));
        let result = aggregator.finish();
        assert!(result.cards.is_empty());
        assert!(result.errors.is_empty());
    }
}
