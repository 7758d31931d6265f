//! Category listing cache with a time-to-live
//!
//! The persisted `index.json` is reused while it is younger than the TTL.
//! Missing, stale or unreadable files all lead to the same place: a fresh
//! download that overwrites the file wholesale.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::domain::category::CategoryDef;
use crate::domain::errors::{IndexCacheError, SyncError};
use crate::domain::inventory::{IndexEntry, decode_index_rows};
use crate::domain::services::CatalogSource;
use crate::infrastructure::file_times;
use crate::infrastructure::inventory_paths::InventoryPaths;

/// Listing entries plus the moment they were fetched (the file's mtime)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedIndex {
    pub entries: Vec<IndexEntry>,
    pub fetched_at: SystemTime,
    /// Served from disk without network access
    pub from_cache: bool,
}

pub struct IndexCache {
    catalog: Arc<dyn CatalogSource>,
    ttl: Duration,
    delay: Duration,
}

impl IndexCache {
    pub fn new(catalog: Arc<dyn CatalogSource>, ttl: Duration, delay: Duration) -> Self {
        Self { catalog, ttl, delay }
    }

    pub async fn get_index(&self, category: &CategoryDef, paths: &InventoryPaths) -> Result<LoadedIndex, SyncError> {
        let log_tag = format!("[Load/{}]", category.name);

        match self.load_cached(paths, SystemTime::now()).await {
            Ok(index) => {
                info!("{} Loaded {} products from {}", log_tag, index.entries.len(), paths.index_file().display());
                return Ok(index);
            }
            Err(IndexCacheError::Missing) => info!("{} No index file yet", log_tag),
            Err(IndexCacheError::Stale { age_minutes }) => {
                info!("{} Index file is {} minutes old, refreshing", log_tag, age_minutes);
            }
            Err(e) => warn!("{} Failed to parse index file, redownloading: {}", log_tag, e),
        }

        self.download(category, paths).await
    }

    /// Use the persisted index if it is younger than the TTL at `now`
    pub async fn load_cached(&self, paths: &InventoryPaths, now: SystemTime) -> Result<LoadedIndex, IndexCacheError> {
        let path = paths.index_file();
        let fetched_at = match file_times::modified_time(&path) {
            Ok(modified) => modified,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(IndexCacheError::Missing),
            Err(e) => return Err(e.into()),
        };

        let age = now.duration_since(fetched_at).unwrap_or(Duration::ZERO);
        if age >= self.ttl {
            return Err(IndexCacheError::Stale {
                age_minutes: age.as_secs() / 60,
            });
        }

        let bytes = tokio::fs::read(&path).await?;
        let rows: Vec<Value> = serde_json::from_slice(&bytes)?;
        let entries = decode_index_rows(rows, &path.display().to_string());
        Ok(LoadedIndex {
            entries,
            fetched_at,
            from_cache: true,
        })
    }

    /// Page through the remote listing and overwrite `index.json`
    pub async fn download(&self, category: &CategoryDef, paths: &InventoryPaths) -> Result<LoadedIndex, SyncError> {
        let log_tag = format!("[DL/{}]", category.name);

        info!("{} Downloading first page...", log_tag);
        let first = self.catalog.fetch_index_page(category, 1).await?;
        let last_page = first.last_page;
        info!("{} Total amount of pages: {}", log_tag, last_page);

        let mut entries = first.entries;
        for page in 2..=last_page {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            info!("{} Downloading page #{}", log_tag, page);
            let next = self.catalog.fetch_index_page(category, page).await?;
            entries.extend(next.entries);
        }

        info!("{} Dumping {} products to {}", log_tag, entries.len(), paths.index_file().display());
        let fetched_at = persist_index(paths, &entries, None).await?;
        Ok(LoadedIndex {
            entries,
            fetched_at,
            from_cache: false,
        })
    }
}

/// Write `index.json`. With `keep_mtime` the file's modification time is
/// restored afterwards so the TTL window is not restarted. Returns the
/// resulting modification time.
pub async fn persist_index(
    paths: &InventoryPaths,
    entries: &[IndexEntry],
    keep_mtime: Option<SystemTime>,
) -> Result<SystemTime, SyncError> {
    let path = paths.index_file();
    let content = serde_json::to_vec_pretty(entries).map_err(|source| SyncError::Decode {
        what: path.display().to_string(),
        source,
    })?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| SyncError::io(&path, e))?;

    if let Some(mtime) = keep_mtime {
        file_times::set_modified_time(&path, mtime).map_err(|e| SyncError::io(&path, e))?;
    }
    file_times::modified_time(&path).map_err(|e| SyncError::io(&path, e))
}
