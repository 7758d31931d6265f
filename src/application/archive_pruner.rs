//! Retention sweeps, run after reconciliation on every cycle
//!
//! 1. Legacy cleanup: top-level dated `<digits>*.json` files past retention
//! 2. Abandoned records: product directories that were never marked seen
//! 3. Archive cap: oldest historical archives evicted until under the cap

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::info;

use crate::domain::errors::SyncError;
use crate::domain::repositories::SnapshotRepository;
use crate::infrastructure::inventory_paths::{InventoryPaths, LATEST_ARCHIVE_NAME, PENDING_ARCHIVE_NAME};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub legacy_deleted: usize,
    pub abandoned_deleted: usize,
    pub archives_evicted: Vec<PathBuf>,
    /// Size of historical archives left after eviction
    pub archive_bytes: u64,
}

/// Historical archive with its size, as seen during the cap sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub size: u64,
}

pub struct ArchivePruner {
    paths: InventoryPaths,
    repository: Arc<dyn SnapshotRepository>,
    legacy_retention: Duration,
    archive_cap_bytes: u64,
}

impl ArchivePruner {
    pub fn new(
        paths: InventoryPaths,
        repository: Arc<dyn SnapshotRepository>,
        legacy_retention: Duration,
        archive_cap_bytes: u64,
    ) -> Self {
        Self {
            paths,
            repository,
            legacy_retention,
            archive_cap_bytes,
        }
    }

    pub async fn prune(&self, now: SystemTime) -> Result<PruneReport, SyncError> {
        let legacy_deleted = self.delete_legacy_files(now).await?;
        let abandoned_deleted = self.delete_abandoned_records().await?;
        let (archives_evicted, archive_bytes) = self.enforce_archive_cap().await?;

        Ok(PruneReport {
            legacy_deleted,
            abandoned_deleted,
            archives_evicted,
            archive_bytes,
        })
    }

    pub async fn delete_legacy_files(&self, now: SystemTime) -> Result<usize, SyncError> {
        let root = self.paths.category_root();
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(SyncError::io(root, e)),
        };

        let mut deleted = 0;
        while let Some(entry) = entries.next_entry().await.map_err(|e| SyncError::io(root, e))? {
            let path = entry.path();
            if !is_legacy_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let metadata = entry.metadata().await.map_err(|e| SyncError::io(&path, e))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().map_err(|e| SyncError::io(&path, e))?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > self.legacy_retention {
                info!(
                    "[{}] Deleting legacy file {} ({} days old)",
                    self.paths.category(),
                    path.display(),
                    age.as_secs() / 86_400
                );
                fs::remove_file(&path).await.map_err(|e| SyncError::io(&path, e))?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// A record without a liveness marker was created by a run that never
    /// finished confirming it
    pub async fn delete_abandoned_records(&self) -> Result<usize, SyncError> {
        let mut deleted = 0;
        for id in self.repository.list_records().await? {
            if self.repository.last_seen(&id).await?.is_none() {
                info!("[{}] Deleting abandoned record {}", self.paths.category(), id);
                self.repository.delete_record(&id).await?;
                deleted += 1;
            }
        }
        info!("[{}] Deleted {} abandoned records", self.paths.category(), deleted);
        Ok(deleted)
    }

    /// Returns the evicted archives (oldest first) and the remaining total size
    pub async fn enforce_archive_cap(&self) -> Result<(Vec<PathBuf>, u64), SyncError> {
        let archives = list_historical_archives(&self.paths).await?;
        let mut total: u64 = archives.iter().map(|a| a.size).sum();
        let mut evicted = Vec::new();

        for archive in archives {
            if total <= self.archive_cap_bytes {
                break;
            }
            info!(
                "[{}] Archive size {} MB over cap, deleting {}",
                self.paths.category(),
                total / (1024 * 1024),
                archive.path.display()
            );
            fs::remove_file(&archive.path)
                .await
                .map_err(|e| SyncError::io(&archive.path, e))?;
            total -= archive.size;
            evicted.push(archive.path);
        }
        Ok((evicted, total))
    }
}

/// `[0-9]*.json`
fn is_legacy_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_digit()) && name.ends_with(".json")
}

/// Every `*.zip` in `archives/` except `latest.zip` and `new.zip`, oldest name first
pub async fn list_historical_archives(paths: &InventoryPaths) -> Result<Vec<ArchiveFile>, SyncError> {
    let dir = paths.archives_dir();
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::io(&dir, e)),
    };

    let mut archives = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| SyncError::io(&dir, e))? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".zip") || name == LATEST_ARCHIVE_NAME || name == PENDING_ARCHIVE_NAME {
            continue;
        }
        let metadata = entry.metadata().await.map_err(|e| SyncError::io(entry.path(), e))?;
        if metadata.is_file() {
            archives.push(ArchiveFile {
                path: entry.path(),
                size: metadata.len(),
            });
        }
    }
    archives.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(archives)
}
