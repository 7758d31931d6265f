//! Upgrades of pre-versioning data
//!
//! Early runs stored one flat `<id>.json` per item at the category root with
//! no timestamp other than the file's mtime. Those files are moved into the
//! item's snapshot directory under a name derived from that mtime.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::category::CategoryRegistry;
use crate::domain::errors::SyncError;
use crate::domain::inventory::ProductId;
use crate::domain::timestamp::SnapshotTimestamp;
use crate::infrastructure::inventory_paths::{ARCHIVES_DIR_NAME, InventoryPaths, PRODUCTS_DIR_NAME};

#[derive(Debug, Clone)]
pub struct LegacyMigrator {
    paths: InventoryPaths,
}

impl LegacyMigrator {
    pub fn new(paths: InventoryPaths) -> Self {
        Self { paths }
    }

    /// Move a non-empty `<id>.json` into `products/<id>/`. Returns the
    /// snapshot timestamp when a file was migrated; a no-op otherwise.
    pub async fn migrate_item(&self, id: &ProductId) -> Result<Option<SnapshotTimestamp>, SyncError> {
        let legacy = self.paths.legacy_file(id);
        let metadata = match fs::metadata(&legacy).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SyncError::io(&legacy, e)),
        };
        if !metadata.is_file() || metadata.len() == 0 {
            return Ok(None);
        }

        let modified = metadata.modified().map_err(|e| SyncError::io(&legacy, e))?;
        let timestamp = SnapshotTimestamp::from_system_time(modified);
        let target = self.paths.snapshot_file(id, timestamp);

        info!(
            "[Product {}]: migrating legacy file {} to {}",
            id,
            legacy.display(),
            timestamp.file_name()
        );
        let dir = self.paths.product_dir(id);
        fs::create_dir_all(&dir).await.map_err(|e| SyncError::io(&dir, e))?;
        fs::rename(&legacy, &target)
            .await
            .map_err(|e| SyncError::io(&legacy, e))?;

        Ok(Some(timestamp))
    }
}

/// One-time move from the single-category layout (`<root>/archives`,
/// `<root>/products`) into the first registered category. Skipped once that
/// category has an index file. Returns the number of moved entries.
pub async fn migrate_flat_layout(inventory_root: &Path, registry: &CategoryRegistry) -> Result<usize, SyncError> {
    let Some(first) = registry.first() else {
        return Ok(0);
    };
    let target = InventoryPaths::new(inventory_root, &first.name);
    if fs::try_exists(target.index_file()).await.unwrap_or(false) {
        return Ok(0);
    }

    info!("Migrating legacy data, if any, to the per-category layout");
    let mut moved = 0;

    let old_archives = inventory_root.join(ARCHIVES_DIR_NAME);
    for source in list_dir(&old_archives).await? {
        let is_zip = source.extension().is_some_and(|ext| ext == "zip");
        let Some(name) = source.file_name() else { continue };
        if !is_zip || !source.is_file() {
            continue;
        }
        let destination = target.archives_dir().join(name);
        info!("Moving {} to {}", source.display(), destination.display());
        fs::rename(&source, &destination)
            .await
            .map_err(|e| SyncError::io(&source, e))?;
        moved += 1;
    }

    let old_products = inventory_root.join(PRODUCTS_DIR_NAME);
    for source in list_dir(&old_products).await? {
        let Some(name) = source.file_name() else { continue };
        if !source.is_dir() {
            continue;
        }
        let destination = target.products_dir().join(name);
        if destination.exists() {
            warn!("Skipping {}: {} already exists", source.display(), destination.display());
            continue;
        }
        info!("Moving {} to {}", source.display(), destination.display());
        fs::rename(&source, &destination)
            .await
            .map_err(|e| SyncError::io(&source, e))?;
        moved += 1;
    }

    info!("Migration done ({} entries moved)", moved);
    Ok(moved)
}

async fn list_dir(dir: &Path) -> Result<Vec<std::path::PathBuf>, SyncError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SyncError::io(dir, e)),
    };
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| SyncError::io(dir, e))? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category::CategoryDef;
    use crate::domain::repositories::SnapshotRepository;
    use crate::infrastructure::file_times;
    use crate::test_utils::TestInventory;
    use chrono::{TimeZone, Utc};
    use std::time::SystemTime;

    fn new_year_2024() -> SystemTime {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().into()
    }

    #[tokio::test]
    async fn test_flat_file_becomes_first_snapshot() {
        let inventory = TestInventory::new("laptops").await;
        let id = ProductId::Number(42);
        let legacy = inventory.paths.legacy_file(&id);
        std::fs::write(&legacy, br#"{"price": "99.00"}"#).unwrap();
        file_times::set_modified_time(&legacy, new_year_2024()).unwrap();

        let migrated = LegacyMigrator::new(inventory.paths.clone())
            .migrate_item(&id)
            .await
            .unwrap();

        let expected = SnapshotTimestamp::parse("2024-01-01_00-00-00").unwrap();
        assert_eq!(migrated, Some(expected));
        assert!(!legacy.exists());
        assert!(
            inventory
                .dir
                .path()
                .join("laptops/products/42/2024-01-01_00-00-00.json")
                .exists()
        );
        assert_eq!(inventory.repository.list_snapshots(&id).await.unwrap(), vec![expected]);
    }

    #[tokio::test]
    async fn test_empty_or_missing_flat_file_is_ignored() {
        let inventory = TestInventory::new("laptops").await;
        let migrator = LegacyMigrator::new(inventory.paths.clone());

        assert_eq!(migrator.migrate_item(&ProductId::Number(1)).await.unwrap(), None);

        let empty = inventory.paths.legacy_file(&ProductId::Number(2));
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(migrator.migrate_item(&ProductId::Number(2)).await.unwrap(), None);
        assert!(empty.exists());
    }

    #[tokio::test]
    async fn test_flat_layout_moves_into_first_category() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let registry = CategoryRegistry::new(vec![CategoryDef::new("laptops", 8), CategoryDef::new("monitors", 11)]);
        InventoryPaths::new(root, "laptops").ensure_layout().await.unwrap();

        std::fs::create_dir_all(root.join("archives")).unwrap();
        std::fs::write(root.join("archives/2024-02-01_10-00-00.zip"), b"zip").unwrap();
        std::fs::create_dir_all(root.join("products/7")).unwrap();
        std::fs::write(root.join("products/7/2024-02-01_10-00-00.json"), b"{}").unwrap();

        let moved = migrate_flat_layout(root, &registry).await.unwrap();

        assert_eq!(moved, 2);
        assert!(root.join("laptops/archives/2024-02-01_10-00-00.zip").exists());
        assert!(root.join("laptops/products/7/2024-02-01_10-00-00.json").exists());
        assert!(!root.join("products/7").exists());
    }

    #[tokio::test]
    async fn test_flat_layout_skipped_once_index_exists() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        let registry = CategoryRegistry::new(vec![CategoryDef::new("laptops", 8)]);
        let paths = InventoryPaths::new(root, "laptops");
        paths.ensure_layout().await.unwrap();
        std::fs::write(paths.index_file(), b"[]").unwrap();
        std::fs::create_dir_all(root.join("products/7")).unwrap();

        assert_eq!(migrate_flat_layout(root, &registry).await.unwrap(), 0);
        assert!(root.join("products/7").exists());
    }
}
