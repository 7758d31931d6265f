//! Per-item reconciliation against the versioned snapshot store
//!
//! For each listing row: migrate legacy data, drop duplicate snapshots,
//! reuse the latest snapshot when the price is unchanged, otherwise fetch
//! the detail page and append a new snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::legacy_migrator::LegacyMigrator;
use crate::domain::errors::{StorageError, SyncError};
use crate::domain::inventory::{IndexEntry, ProductId, ProductSnapshot};
use crate::domain::repositories::SnapshotRepository;
use crate::domain::services::{CatalogSource, DetailFetch};
use crate::domain::timestamp::SnapshotTimestamp;

/// Outcome of reconciling one listing row
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Current attributes, either reused or freshly fetched
    Current { snapshot: ProductSnapshot, fetched: bool },
    /// The detail page says the item is gone
    Delisted { reason: String },
}

/// Snapshots removed by deduplication, mapped to the earlier snapshot they duplicated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    pub kept: Vec<SnapshotTimestamp>,
    pub removed: Vec<(SnapshotTimestamp, SnapshotTimestamp)>,
}

impl DedupOutcome {
    /// Timestamp that now holds the content written at `timestamp`
    pub fn resolve(&self, timestamp: SnapshotTimestamp) -> SnapshotTimestamp {
        self.removed
            .iter()
            .find(|(removed, _)| *removed == timestamp)
            .map_or(timestamp, |(_, original)| *original)
    }
}

/// Result of reconciling a whole listing
#[derive(Debug, Clone, Default)]
pub struct ReconciledInventory {
    /// Listing rows still present, in listing order (delisted rows removed)
    pub entries: Vec<IndexEntry>,
    pub snapshots: HashMap<ProductId, ProductSnapshot>,
    pub delisted: Vec<ProductId>,
    /// Rows skipped because of a per-item error; kept in the listing
    pub failed: Vec<ProductId>,
    pub fetched: usize,
}

pub struct SnapshotStore {
    category: String,
    repository: Arc<dyn SnapshotRepository>,
    catalog: Arc<dyn CatalogSource>,
    migrator: LegacyMigrator,
    delay: Duration,
}

impl SnapshotStore {
    pub fn new(
        category: &str,
        repository: Arc<dyn SnapshotRepository>,
        catalog: Arc<dyn CatalogSource>,
        migrator: LegacyMigrator,
        delay: Duration,
    ) -> Self {
        Self {
            category: category.to_string(),
            repository,
            catalog,
            migrator,
            delay,
        }
    }

    pub async fn reconcile(&self, entry: &IndexEntry) -> Result<Reconciliation, SyncError> {
        let id = &entry.id;
        self.migrator.migrate_item(id).await?;
        self.deduplicate(id).await?;

        let snapshots = self.repository.list_snapshots(id).await?;
        if let Some(&latest) = snapshots.last() {
            self.repository.mark_seen(id, SnapshotTimestamp::now()).await?;

            match self.repository.read_snapshot(id, latest).await {
                Ok(attributes) if attributes.price().as_ref() == Some(&entry.price) => {
                    debug!("[Product {}]: price unchanged, reusing {}", id, latest);
                    return Ok(Reconciliation::Current {
                        snapshot: ProductSnapshot::new(id.clone(), &self.category, latest, attributes),
                        fetched: false,
                    });
                }
                Ok(_) => {}
                Err(e) if e.is_decode() => {
                    warn!("[Product {}]: latest snapshot is unreadable, refetching: {}", id, e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.fetch_and_store(entry).await
    }

    async fn fetch_and_store(&self, entry: &IndexEntry) -> Result<Reconciliation, SyncError> {
        let log_tag = format!("[Load/{}]", self.category);
        let id = &entry.id;
        info!("{} Downloading details of {}: {}", log_tag, id, entry.title);

        if !self.delay.is_zero() {
            debug!("{} Sleeping for {:?} to avoid blocking", log_tag, self.delay);
            tokio::time::sleep(self.delay).await;
        }

        let attributes = match self.catalog.fetch_detail_page(&entry.url).await? {
            DetailFetch::Found(attributes) => attributes,
            DetailFetch::NotFound { reason } => {
                info!("{} {} is gone ({}), removing from index", log_tag, id, reason);
                return Ok(Reconciliation::Delisted { reason });
            }
        };

        let written = SnapshotTimestamp::now();
        self.repository.write_snapshot(id, written, &attributes).await?;
        self.repository.mark_seen(id, written).await?;

        let timestamp = self.deduplicate(id).await?.resolve(written);
        Ok(Reconciliation::Current {
            snapshot: ProductSnapshot::new(id.clone(), &self.category, timestamp, attributes),
            fetched: true,
        })
    }

    /// Delete every snapshot whose content hash was already seen in an
    /// earlier snapshot of the same record
    pub async fn deduplicate(&self, id: &ProductId) -> Result<DedupOutcome, StorageError> {
        let mut seen: HashMap<blake3::Hash, SnapshotTimestamp> = HashMap::new();
        let mut outcome = DedupOutcome::default();

        for timestamp in self.repository.list_snapshots(id).await? {
            let bytes = self.repository.read_snapshot_bytes(id, timestamp).await?;
            let hash = blake3::hash(&bytes);
            if let Some(&original) = seen.get(&hash) {
                info!(
                    "[Product {}]: Deleting duplicate data file {} with hash {}",
                    id,
                    timestamp.file_name(),
                    hash.to_hex()
                );
                self.repository.delete_snapshot(id, timestamp).await?;
                outcome.removed.push((timestamp, original));
            } else {
                seen.insert(hash, timestamp);
                outcome.kept.push(timestamp);
            }
        }
        Ok(outcome)
    }

    /// Reconcile every row, oldest article first, so items added between two
    /// runs get snapshot files in the order they were added to the catalog
    pub async fn reconcile_all(&self, entries: &[IndexEntry]) -> Result<ReconciledInventory, SyncError> {
        let log_tag = format!("[Load/{}]", self.category);
        let mut ordered: Vec<&IndexEntry> = entries.iter().collect();
        ordered.sort_by(|a, b| a.article.cmp(&b.article));

        let mut result = ReconciledInventory::default();
        let mut delisted = HashSet::new();

        for entry in ordered {
            match self.reconcile(entry).await {
                Ok(Reconciliation::Current { snapshot, fetched }) => {
                    if fetched {
                        result.fetched += 1;
                    }
                    result.snapshots.insert(entry.id.clone(), snapshot);
                }
                Ok(Reconciliation::Delisted { .. }) => {
                    delisted.insert(entry.id.clone());
                    result.delisted.push(entry.id.clone());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{} Skipping {}: {}", log_tag, entry.id, e);
                    result.failed.push(entry.id.clone());
                }
            }
        }

        result.entries = entries
            .iter()
            .filter(|entry| !delisted.contains(&entry.id))
            .cloned()
            .collect();

        info!(
            "{} Reconciled {} items ({} fetched, {} delisted, {} failed)",
            log_tag,
            result.snapshots.len(),
            result.fetched,
            result.delisted.len(),
            result.failed.len()
        );
        Ok(result)
    }
}
