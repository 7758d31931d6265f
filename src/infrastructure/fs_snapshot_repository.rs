//! Filesystem implementation of [`SnapshotRepository`]
//!
//! One directory per product id under `products/`, one pretty-printed JSON
//! file per snapshot, plus a plain-text `last_seen` marker.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::errors::StorageError;
use crate::domain::inventory::{ProductId, RawAttributes};
use crate::domain::repositories::SnapshotRepository;
use crate::domain::timestamp::SnapshotTimestamp;
use crate::infrastructure::inventory_paths::InventoryPaths;

#[derive(Debug, Clone)]
pub struct FsSnapshotRepository {
    paths: InventoryPaths,
}

impl FsSnapshotRepository {
    pub fn new(paths: InventoryPaths) -> Self {
        Self { paths }
    }

    /// Factory handed to the coordinator; one repository per category
    pub fn shared(paths: &InventoryPaths) -> Arc<dyn SnapshotRepository> {
        Arc::new(Self::new(paths.clone()))
    }

    pub fn paths(&self) -> &InventoryPaths {
        &self.paths
    }
}

#[async_trait]
impl SnapshotRepository for FsSnapshotRepository {
    async fn list_snapshots(&self, id: &ProductId) -> Result<Vec<SnapshotTimestamp>, StorageError> {
        let dir = self.paths.product_dir(id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::io(&dir, e))? {
            let Some(timestamp) = entry.file_name().to_str().and_then(SnapshotTimestamp::from_file_name) else {
                continue;
            };
            let metadata = entry.metadata().await.map_err(|e| StorageError::io(entry.path(), e))?;
            if metadata.is_file() && metadata.len() > 0 {
                snapshots.push(timestamp);
            }
        }
        snapshots.sort_unstable();
        Ok(snapshots)
    }

    async fn read_snapshot(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
    ) -> Result<RawAttributes, StorageError> {
        let path = self.paths.snapshot_file(id, timestamp);
        let bytes = self.read_snapshot_bytes(id, timestamp).await?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::decode(path, e))
    }

    async fn read_snapshot_bytes(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
    ) -> Result<Vec<u8>, StorageError> {
        let path = self.paths.snapshot_file(id, timestamp);
        fs::read(&path).await.map_err(|e| StorageError::io(path, e))
    }

    async fn write_snapshot(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
        attributes: &RawAttributes,
    ) -> Result<(), StorageError> {
        let dir = self.paths.product_dir(id);
        fs::create_dir_all(&dir).await.map_err(|e| StorageError::io(&dir, e))?;

        let path = self.paths.snapshot_file(id, timestamp);
        let content = serde_json::to_vec_pretty(attributes).map_err(|e| StorageError::decode(&path, e))?;
        fs::write(&path, content).await.map_err(|e| StorageError::io(&path, e))?;
        debug!("[Product {}]: created file {}", id, timestamp.file_name());
        Ok(())
    }

    async fn delete_snapshot(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
    ) -> Result<(), StorageError> {
        let path = self.paths.snapshot_file(id, timestamp);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn mark_seen(&self, id: &ProductId, at: SnapshotTimestamp) -> Result<(), StorageError> {
        let dir = self.paths.product_dir(id);
        fs::create_dir_all(&dir).await.map_err(|e| StorageError::io(&dir, e))?;

        let path = self.paths.last_seen_file(id);
        fs::write(&path, at.to_string()).await.map_err(|e| StorageError::io(path, e))
    }

    async fn last_seen(&self, id: &ProductId) -> Result<Option<SnapshotTimestamp>, StorageError> {
        let path = self.paths.last_seen_file(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        if let Ok(timestamp) = SnapshotTimestamp::parse(&content) {
            return Ok(Some(timestamp));
        }

        // An unreadable marker still proves the record was confirmed once
        warn!("[Product {}]: unparsable last_seen marker {:?}, using file time", id, content);
        let metadata = fs::metadata(&path).await.map_err(|e| StorageError::io(&path, e))?;
        let modified = metadata.modified().map_err(|e| StorageError::io(&path, e))?;
        Ok(Some(SnapshotTimestamp::from_system_time(modified)))
    }

    async fn list_records(&self) -> Result<Vec<ProductId>, StorageError> {
        let dir = self.paths.products_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::io(&dir, e))? {
            let file_type = entry.file_type().await.map_err(|e| StorageError::io(entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                records.push(ProductId::from_dir_name(name));
            }
        }
        Ok(records)
    }

    async fn delete_record(&self, id: &ProductId) -> Result<(), StorageError> {
        let dir = self.paths.product_dir(id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(dir, e)),
        }
    }
}
