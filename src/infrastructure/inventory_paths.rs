//! Inventory path layout, in one place
//!
//! ```text
//! <inventory_root>/<category>/index.json
//! <inventory_root>/<category>/normalized.json
//! <inventory_root>/<category>/products/<id>/<YYYY-MM-DD_HH-MM-SS>.json
//! <inventory_root>/<category>/products/<id>/last_seen
//! <inventory_root>/<category>/archives/latest.zip | new.zip | <timestamp>.zip
//! <inventory_root>/<category>/<id>.json   (legacy, pre-versioning)
//! ```

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::errors::SyncError;
use crate::domain::inventory::ProductId;
use crate::domain::timestamp::SnapshotTimestamp;

pub const INDEX_FILE_NAME: &str = "index.json";
pub const NORMALIZED_FILE_NAME: &str = "normalized.json";
pub const PRODUCTS_DIR_NAME: &str = "products";
pub const ARCHIVES_DIR_NAME: &str = "archives";
pub const LAST_SEEN_FILE_NAME: &str = "last_seen";
pub const LATEST_ARCHIVE_NAME: &str = "latest.zip";
pub const PENDING_ARCHIVE_NAME: &str = "new.zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryPaths {
    category: String,
    root: PathBuf,
}

impl InventoryPaths {
    pub fn new(inventory_root: &Path, category: &str) -> Self {
        Self {
            category: category.to_string(),
            root: inventory_root.join(category),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn category_root(&self) -> &Path {
        &self.root
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    pub fn normalized_file(&self) -> PathBuf {
        self.root.join(NORMALIZED_FILE_NAME)
    }

    pub fn products_dir(&self) -> PathBuf {
        self.root.join(PRODUCTS_DIR_NAME)
    }

    pub fn product_dir(&self, id: &ProductId) -> PathBuf {
        self.products_dir().join(id.to_string())
    }

    pub fn snapshot_file(&self, id: &ProductId, timestamp: SnapshotTimestamp) -> PathBuf {
        self.product_dir(id).join(timestamp.file_name())
    }

    pub fn last_seen_file(&self, id: &ProductId) -> PathBuf {
        self.product_dir(id).join(LAST_SEEN_FILE_NAME)
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.root.join(ARCHIVES_DIR_NAME)
    }

    pub fn latest_archive(&self) -> PathBuf {
        self.archives_dir().join(LATEST_ARCHIVE_NAME)
    }

    pub fn pending_archive(&self) -> PathBuf {
        self.archives_dir().join(PENDING_ARCHIVE_NAME)
    }

    pub fn historical_archive(&self, timestamp: SnapshotTimestamp) -> PathBuf {
        self.archives_dir().join(format!("{timestamp}.zip"))
    }

    /// Pre-versioning flat snapshot at the category root
    pub fn legacy_file(&self, id: &ProductId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Create `products/` and `archives/` for this category
    pub async fn ensure_layout(&self) -> Result<(), SyncError> {
        for dir in [self.products_dir(), self.archives_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| SyncError::io(&dir, e))?;
        }
        debug!("📁 Inventory layout ready: {}", self.root.display());
        Ok(())
    }
}
