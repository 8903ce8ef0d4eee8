//! Optional catalog enrichment.
//!
//! List pages rarely carry rarity, artwork, or the catalog's own set
//! grouping. When enabled, each aggregated card that has a set name and a
//! collector number is looked up in the TCGplayer catalog mirror and its
//! *absent* `rarity`, `image_url` and `group_name` fields are filled from
//! the matched product. Fields the page already provided are never
//! overwritten, and a card without a match passes through unchanged.
//!
//! Catalog failures never fail the run: a group whose products cannot be
//! fetched simply yields no matches. Across runs, responses can be kept in
//! a [`cache::DiskCache`].

pub mod cache;
pub mod matcher;
pub mod tcgcsv;

use crate::models::CardRecord;
use futures::stream::{self, StreamExt};
use matcher::{GroupDirectory, ProductIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tcgcsv::{CatalogError, Product, TcgCsvClient};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

/// Lookups run concurrently up to this many cards.
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 15;

/// A product matched to a card, with the name of the group it came from.
#[derive(Debug, Clone)]
pub struct CatalogMatch {
    pub product: Product,
    pub group_name: String,
}

type IndexCell = Arc<OnceCell<Arc<ProductIndex>>>;

/// Looks cards up in the catalog, caching product indexes for one run.
pub struct Enricher {
    client: TcgCsvClient,
    groups: GroupDirectory,
    indexes: Mutex<HashMap<u64, IndexCell>>,
    concurrency: usize,
}

impl Enricher {
    /// Fetch the group directory and prepare an empty product cache.
    ///
    /// # Arguments
    ///
    /// * `client` - Catalog client, optionally backed by a disk cache
    ///
    /// # Errors
    ///
    /// Returns the [`CatalogError`] of the group directory request. Product
    /// lists are fetched lazily and their failures are only logged.
    pub async fn connect(client: TcgCsvClient) -> Result<Self, CatalogError> {
        let groups = GroupDirectory::new(client.groups().await?);
        Ok(Self::with_groups(client, groups))
    }

    /// Build from an already known group directory, without any request.
    pub fn with_groups(client: TcgCsvClient, groups: GroupDirectory) -> Self {
        Self {
            client,
            groups,
            indexes: Mutex::new(HashMap::new()),
            concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Product index of one group, fetched at most once per run.
    async fn index(&self, group_id: u64) -> Arc<ProductIndex> {
        let cell = {
            let mut indexes = self.indexes.lock().await;
            indexes.entry(group_id).or_default().clone()
        };
        cell.get_or_init(|| async {
            match self.client.products(group_id).await {
                Ok(products) => Arc::new(ProductIndex::build(&products)),
                Err(e) => {
                    warn!(group_id, error = %e, "Failed to fetch catalog products");
                    Arc::new(ProductIndex::default())
                }
            }
        })
        .await
        .clone()
    }

    async fn find_in(&self, group_id: u64, name: &str, number: &str) -> Option<Product> {
        self.index(group_id).await.find(name, number).cloned()
    }

    /// Find the catalog product for one card.
    ///
    /// Resolves the set to a group; promo sets without a direct group are
    /// searched across every promo group; a miss in the resolved group falls
    /// back to related subset groups.
    #[instrument(level = "debug", skip_all, fields(name = %card.name))]
    pub async fn lookup(&self, card: &CardRecord) -> Option<CatalogMatch> {
        let set_name = card.set_name.as_deref()?;
        let number = card.number.as_deref()?;
        let found = |product: Product, group_name: &str| CatalogMatch {
            product,
            group_name: group_name.to_string(),
        };

        let Some(group_id) = self.groups.resolve(set_name) else {
            if set_name.to_lowercase().contains("promo") {
                for promo in self.groups.promos() {
                    if let Some(product) = self.find_in(promo.group_id, &card.name, number).await {
                        return Some(found(product, &promo.name));
                    }
                }
            }
            debug!(set_name, "No catalog group for set");
            return None;
        };

        if let Some(product) = self.find_in(group_id, &card.name, number).await {
            let group_name = self.groups.name_of(group_id).unwrap_or(set_name);
            return Some(found(product, group_name));
        }

        for related in self.groups.related(set_name, group_id) {
            if let Some(product) = self.find_in(related.group_id, &card.name, number).await {
                return Some(found(product, &related.name));
            }
        }

        debug!(set_name, number, "No catalog product match");
        None
    }

    /// Fill absent catalog fields on every card, keeping input order.
    #[instrument(level = "info", skip_all, fields(cards = cards.len()))]
    pub async fn enrich(&self, cards: Vec<CardRecord>) -> Vec<CardRecord> {
        let enriched: Vec<(CardRecord, bool)> = stream::iter(cards)
            .map(|card| async move {
                match self.lookup(&card).await {
                    Some(found) => (apply_match(card, &found), true),
                    None => (card, false),
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let matched = enriched.iter().filter(|(_, hit)| *hit).count();
        info!(total = enriched.len(), matched, "Catalog enrichment finished");
        enriched.into_iter().map(|(card, _)| card).collect()
    }
}

/// Copy catalog values into fields the card does not have yet.
pub fn apply_match(mut card: CardRecord, found: &CatalogMatch) -> CardRecord {
    let product = &found.product;
    if card.rarity.is_none() {
        card.rarity = product.extended("Rarity").map(str::to_string);
    }
    if card.image_url.is_none() {
        card.image_url = product.image_url.clone().filter(|u| !u.is_empty());
    }
    if card.group_name.is_none() {
        card.group_name = Some(found.group_name.clone());
    }
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcgcsv::ExtendedData;

    fn found() -> CatalogMatch {
        CatalogMatch {
            product: Product {
                product_id: 7,
                name: "Mew ex".into(),
                clean_name: None,
                image_url: Some("https://cdn.example/7.jpg".into()),
                extended_data: vec![ExtendedData {
                    name: "Rarity".into(),
                    value: "Double Rare".into(),
                }],
            },
            group_name: "SV: Scarlet & Violet 151".into(),
        }
    }

    #[test]
    fn test_apply_fills_absent_fields() {
        let card = CardRecord {
            name: "Mew ex".into(),
            ..Default::default()
        };
        let card = apply_match(card, &found());
        assert_eq!(card.rarity.as_deref(), Some("Double Rare"));
        assert_eq!(card.image_url.as_deref(), Some("https://cdn.example/7.jpg"));
        assert_eq!(card.group_name.as_deref(), Some("SV: Scarlet & Violet 151"));
        assert_eq!(card.name, "Mew ex");
    }

    #[test]
    fn test_apply_keeps_page_values() {
        let card = CardRecord {
            name: "Mew ex".into(),
            rarity: Some("Ultra Rare".into()),
            ..Default::default()
        };
        let card = apply_match(card, &found());
        assert_eq!(card.rarity.as_deref(), Some("Ultra Rare"));
    }

    #[tokio::test]
    async fn test_lookup_needs_set_and_number() {
        let enricher = Enricher::with_groups(
            TcgCsvClient::new(reqwest::Client::new(), "http://127.0.0.1:9", 3),
            GroupDirectory::default(),
        );
        let card = CardRecord {
            name: "Mew".into(),
            set_name: Some("151".into()),
            ..Default::default()
        };
        assert!(enricher.lookup(&card).await.is_none());
    }
}
