//! Client for the tcgcsv.com mirror of the TCGplayer catalog.
//!
//! Two endpoints are used, both wrapped in `{ "success": bool, "results": [...] }`:
//!
//! - `GET {base}/{category}/groups`: every set ("group") of a category
//! - `GET {base}/{category}/{group_id}/products`: every product of a group

use super::cache::DiskCache;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const DEFAULT_BASE_URL: &str = "https://tcgcsv.com/tcgplayer";
pub const POKEMON_CATEGORY_ID: u32 = 3;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog reported failure for {0}")]
    Unsuccessful(String),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// One set of a catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedData {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// One catalog product (a single card printing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub product_id: u64,
    pub name: String,
    #[serde(default)]
    pub clean_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub extended_data: Vec<ExtendedData>,
}

impl Product {
    /// Value of a named extended-data entry (`Number`, `Rarity`, ...).
    pub fn extended(&self, key: &str) -> Option<&str> {
        self.extended_data
            .iter()
            .find(|d| d.name == key)
            .map(|d| d.value.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Read-only client for one catalog category.
///
/// Responses are optionally kept in a [`DiskCache`] so repeated runs do not
/// download the same group directory and product lists again.
#[derive(Debug, Clone)]
pub struct TcgCsvClient {
    client: reqwest::Client,
    base_url: String,
    category_id: u32,
    cache: Option<DiskCache>,
}

impl TcgCsvClient {
    /// Create a client without a disk cache.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client (timeouts and user agent come from it)
    /// * `base_url` - Mirror root such as [`DEFAULT_BASE_URL`]; a trailing `/` is ignored
    /// * `category_id` - Catalog category, e.g. [`POKEMON_CATEGORY_ID`]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, category_id: u32) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            category_id,
            cache: None,
        }
    }

    /// Client for the Pokémon category of the public mirror.
    pub fn pokemon(client: reqwest::Client) -> Self {
        Self::new(client, DEFAULT_BASE_URL, POKEMON_CATEGORY_ID)
    }

    /// Serve fresh responses from `cache` and store new ones there.
    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&DiskCache> {
        self.cache.as_ref()
    }

    /// Cached results for `key`, or fetch `path` and cache the results.
    ///
    /// Empty cached lists count as misses.
    async fn cached<T>(&self, key: &str, path: &str) -> Result<Vec<T>, CatalogError>
    where
        T: DeserializeOwned + Serialize,
    {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.read::<Vec<T>>(key).await.filter(|v| !v.is_empty()) {
                debug!(key, count = hit.len(), "Using cached catalog data");
                return Ok(hit);
            }
        }
        let fetched: Vec<T> = self.results(path).await?;
        if let Some(cache) = &self.cache {
            cache.write(key, &fetched).await;
        }
        Ok(fetched)
    }

    async fn results<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, CatalogError> {
        let url = format!("{}/{}/{}", self.base_url, self.category_id, path);
        let envelope: Envelope<T> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !envelope.success {
            return Err(CatalogError::Unsuccessful(url));
        }
        Ok(envelope.results)
    }

    /// Every group (set) of the category.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Http`] for transport or status failures,
    /// [`CatalogError::Unsuccessful`] when the mirror reports `success: false`.
    #[instrument(level = "info", skip_all, fields(category = self.category_id))]
    pub async fn groups(&self) -> Result<Vec<Group>, CatalogError> {
        let groups: Vec<Group> = self.cached("groups", "groups").await?;
        info!(count = groups.len(), "Fetched catalog groups");
        Ok(groups)
    }

    /// Every product of one group. Fails like [`TcgCsvClient::groups`].
    #[instrument(level = "info", skip(self))]
    pub async fn products(&self, group_id: u64) -> Result<Vec<Product>, CatalogError> {
        let products: Vec<Product> = self
            .cached(&format!("products_{group_id}"), &format!("{group_id}/products"))
            .await?;
        info!(count = products.len(), "Fetched catalog products");
        Ok(products)
    }
}
