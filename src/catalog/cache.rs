//! On-disk JSON cache for catalog responses.
//!
//! Catalog data changes slowly, so groups and product lists are kept as
//! pretty-printed JSON files named after their key:
//!
//! ```text
//! cache_dir/
//! ├── groups.json
//! ├── products_23237.json
//! └── products_23353.json
//! ```
//!
//! A file is fresh while its modification time is younger than the TTL.
//! Cache problems are logged and treated as misses; they never fail a
//! lookup.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// One week.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    /// Cache rooted at `dir`. The directory is created on first write.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory holding one `<key>.json` file per entry
    /// * `ttl` - Maximum file age still served; `Duration::ZERO` serves nothing
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    async fn is_fresh(&self, path: &Path) -> bool {
        let Ok(modified) = fs::metadata(path).await.and_then(|m| m.modified()) else {
            return false;
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        age < self.ttl
    }

    /// Read a fresh entry.
    ///
    /// # Returns
    ///
    /// `None` when the file is missing, expired, or does not deserialize.
    #[instrument(level = "debug", skip(self))]
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path(key);
        if !self.is_fresh(&path).await {
            debug!(path = %path.display(), "Cache miss");
            return None;
        }
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cache file");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cache file");
                None
            }
        }
    }

    /// Store an entry, replacing any previous one.
    #[instrument(level = "debug", skip(self, value))]
    pub async fn write<T: Serialize>(&self, key: &str, value: &T) {
        let path = self.path(key);
        let result: io::Result<()> = async {
            fs::create_dir_all(&self.dir).await?;
            let json = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
            fs::write(&path, json).await
        }
        .await;
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write cache file");
        }
    }

    /// Delete every expired `.json` file.
    ///
    /// # Returns
    ///
    /// Number of files removed. A missing directory counts as empty.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from listing or removing files.
    #[instrument(level = "info", skip(self), fields(dir = %self.dir.display()))]
    pub async fn clear_expired(&self) -> io::Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && !self.is_fresh(&path).await {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Cleared expired catalog cache files");
        }
        Ok(removed)
    }
}
