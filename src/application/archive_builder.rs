//! Crash-safe archive rotation
//!
//! `new.zip` is built first, then the previous `latest.zip` is renamed after
//! its own modification time, then `new.zip` becomes `latest.zip`. At every
//! point either `latest.zip` is complete or a stray `new.zip` is left for the
//! next run to discard.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::errors::SyncError;
use crate::domain::repositories::SnapshotRepository;
use crate::domain::timestamp::SnapshotTimestamp;
use crate::infrastructure::file_times;
use crate::infrastructure::inventory_paths::{INDEX_FILE_NAME, InventoryPaths, NORMALIZED_FILE_NAME, PRODUCTS_DIR_NAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub latest: PathBuf,
    /// Where the previous `latest.zip` went, if there was one
    pub rotated: Option<PathBuf>,
    pub files: usize,
    pub bytes: u64,
}

/// One file to bundle: source on disk and its name inside the archive
#[derive(Debug, Clone)]
struct ArchiveEntry {
    source: PathBuf,
    name: String,
}

pub struct ArchiveBuilder {
    paths: InventoryPaths,
    repository: Arc<dyn SnapshotRepository>,
}

impl ArchiveBuilder {
    pub fn new(paths: InventoryPaths, repository: Arc<dyn SnapshotRepository>) -> Self {
        Self { paths, repository }
    }

    pub async fn archive(&self) -> Result<ArchiveOutcome, SyncError> {
        let log_tag = format!("[Archive/{}]", self.paths.category());
        let pending = self.paths.pending_archive();
        let latest = self.paths.latest_archive();

        if remove_if_exists(&pending).await? {
            warn!("{} Removed unfinished {} from an interrupted run", log_tag, pending.display());
        }

        let entries = self.collect_entries().await?;
        let files = entries.len();
        info!("{} Bundling {} files into {}", log_tag, files, pending.display());

        let target = pending.clone();
        tokio::task::spawn_blocking(move || write_zip(&target, &entries))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;

        let rotated = match file_times::modified_time(&latest) {
            Ok(modified) => {
                let historical = self
                    .paths
                    .historical_archive(SnapshotTimestamp::from_system_time(modified));
                info!("{} Rotating {} to {}", log_tag, latest.display(), historical.display());
                tokio::fs::rename(&latest, &historical)
                    .await
                    .map_err(|e| SyncError::io(&latest, e))?;
                Some(historical)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(SyncError::io(&latest, e)),
        };

        tokio::fs::rename(&pending, &latest)
            .await
            .map_err(|e| SyncError::io(&pending, e))?;
        let bytes = tokio::fs::metadata(&latest)
            .await
            .map_err(|e| SyncError::io(&latest, e))?
            .len();
        info!("{} {} ready ({} bytes)", log_tag, latest.display(), bytes);

        Ok(ArchiveOutcome {
            latest,
            rotated,
            files,
            bytes,
        })
    }

    /// Index, normalized output and every snapshot, named relative to the category root
    async fn collect_entries(&self) -> Result<Vec<ArchiveEntry>, SyncError> {
        let mut entries = Vec::new();
        for (source, name) in [
            (self.paths.index_file(), INDEX_FILE_NAME),
            (self.paths.normalized_file(), NORMALIZED_FILE_NAME),
        ] {
            if tokio::fs::try_exists(&source).await.map_err(|e| SyncError::io(&source, e))? {
                entries.push(ArchiveEntry {
                    source,
                    name: name.to_string(),
                });
            }
        }

        let mut records = self.repository.list_records().await?;
        records.sort_by_key(ToString::to_string);
        for id in records {
            for timestamp in self.repository.list_snapshots(&id).await? {
                entries.push(ArchiveEntry {
                    source: self.paths.snapshot_file(&id, timestamp),
                    name: format!("{PRODUCTS_DIR_NAME}/{id}/{}", timestamp.file_name()),
                });
            }
        }
        Ok(entries)
    }
}

fn write_zip(target: &Path, entries: &[ArchiveEntry]) -> Result<(), SyncError> {
    let file = File::create(target).map_err(|e| SyncError::io(target, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        let mut source = File::open(&entry.source).map_err(|e| SyncError::io(&entry.source, e))?;
        io::copy(&mut source, &mut zip).map_err(|e| SyncError::io(&entry.source, e))?;
    }

    let file = zip.finish()?;
    file.sync_all().map_err(|e| SyncError::io(target, e))?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<bool, SyncError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::ProductId;
    use crate::test_utils::{TestInventory, detail_payload};
    use chrono::{TimeZone, Utc};
    use std::time::SystemTime;

    fn archive_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    async fn seed(inventory: &TestInventory) {
        std::fs::write(inventory.paths.index_file(), b"[]").unwrap();
        std::fs::write(inventory.paths.normalized_file(), b"{}").unwrap();
        let stamp = SnapshotTimestamp::parse("2024-04-01_09-30-00").unwrap();
        inventory
            .repository
            .write_snapshot(&ProductId::Number(42), stamp, &detail_payload(42, "10.00"))
            .await
            .unwrap();
        inventory
            .repository
            .mark_seen(&ProductId::Number(42), stamp)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_first_archive_contains_state_files() {
        let inventory = TestInventory::new("laptops").await;
        seed(&inventory).await;

        let outcome = ArchiveBuilder::new(inventory.paths.clone(), inventory.repository.clone())
            .archive()
            .await
            .unwrap();

        assert_eq!(outcome.rotated, None);
        assert_eq!(outcome.files, 3);
        assert_eq!(
            archive_names(&outcome.latest),
            vec!["index.json", "normalized.json", "products/42/2024-04-01_09-30-00.json"]
        );
        assert!(!inventory.paths.pending_archive().exists());
    }

    #[tokio::test]
    async fn test_previous_latest_is_rotated_by_its_own_mtime() {
        let inventory = TestInventory::new("laptops").await;
        seed(&inventory).await;
        let latest = inventory.paths.latest_archive();
        std::fs::write(&latest, b"previous bundle").unwrap();
        let previous_mtime: SystemTime = Utc.with_ymd_and_hms(2024, 3, 31, 23, 0, 0).unwrap().into();
        file_times::set_modified_time(&latest, previous_mtime).unwrap();

        let outcome = ArchiveBuilder::new(inventory.paths.clone(), inventory.repository.clone())
            .archive()
            .await
            .unwrap();

        let rotated = inventory.paths.archives_dir().join("2024-03-31_23-00-00.zip");
        assert_eq!(outcome.rotated, Some(rotated.clone()));
        assert_eq!(std::fs::read(rotated).unwrap(), b"previous bundle");
        assert_eq!(archive_names(&latest).len(), 3);
    }

    #[tokio::test]
    async fn test_stray_pending_archive_is_discarded() {
        let inventory = TestInventory::new("laptops").await;
        seed(&inventory).await;
        std::fs::write(inventory.paths.pending_archive(), b"half-written").unwrap();

        let outcome = ArchiveBuilder::new(inventory.paths.clone(), inventory.repository.clone())
            .archive()
            .await
            .unwrap();

        assert!(!inventory.paths.pending_archive().exists());
        assert_eq!(archive_names(&outcome.latest).len(), 3);
    }
}
