//! Test utilities for inventory-sync
//!
//! An in-memory catalog fake with call counters, fixture builders for
//! listing rows and detail payloads, and a throwaway inventory directory.

use async_trait::async_trait;
use serde_json::{Map, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::domain::category::CategoryDef;
use crate::domain::errors::SyncError;
use crate::domain::inventory::{ArticleKey, Branch, IndexEntry, Price, ProductId, RawAttributes};
use crate::domain::services::{CatalogSource, DetailFetch, IndexPage};
use crate::infrastructure::fs_snapshot_repository::FsSnapshotRepository;
use crate::infrastructure::inventory_paths::InventoryPaths;

pub fn product_url(id: u64) -> String {
    format!("https://shop.test/lv/products/{id}")
}

/// Listing row as the shop returns it (price as a string)
pub fn index_entry(id: u64, article: i64, price: &str) -> IndexEntry {
    IndexEntry {
        id: ProductId::Number(id),
        article: ArticleKey::Number(article),
        title: format!("Laptop #{id}"),
        price: Price::Text(price.to_string()),
        url: product_url(id),
        branch: Branch {
            address: format!("Rīga<br>Brīvības iela {id}"),
            extra: Map::new(),
        },
        extra: Map::new(),
    }
}

/// Detail payload with a spec table and one image
pub fn detail_payload(id: u64, price: &str) -> RawAttributes {
    RawAttributes(json!({
        "id": id,
        "price": price,
        "description_f": [
            {"title": "Procesors", "value": "Intel Core i5-8250U"},
            {"title": "RAM", "value": "8 GB"}
        ],
        "erp_images": [{"path": format!("products/{id}/front.jpg")}]
    }))
}

#[derive(Default)]
pub struct FakeCatalog {
    listings: Mutex<HashMap<u32, Vec<Vec<IndexEntry>>>>,
    details: Mutex<HashMap<String, DetailFetch>>,
    failing: Mutex<HashSet<String>>,
    index_calls: AtomicUsize,
    detail_calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `entries` for a category, `per_page` rows per page
    pub fn set_listing(&self, remote_id: u32, entries: Vec<IndexEntry>, per_page: usize) {
        let pages = if entries.is_empty() {
            vec![Vec::new()]
        } else {
            entries.chunks(per_page.max(1)).map(<[IndexEntry]>::to_vec).collect()
        };
        self.listings.lock().unwrap().insert(remote_id, pages);
    }

    pub fn set_detail(&self, url: &str, attributes: RawAttributes) {
        self.details
            .lock()
            .unwrap()
            .insert(url.to_string(), DetailFetch::Found(attributes));
    }

    pub fn set_not_found(&self, url: &str) {
        self.details.lock().unwrap().insert(
            url.to_string(),
            DetailFetch::NotFound {
                reason: "redirected to https://shop.test/lv/".to_string(),
            },
        );
    }

    pub fn fail_detail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn fetch_index_page(&self, category: &CategoryDef, page: u32) -> Result<IndexPage, SyncError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let listings = self.listings.lock().unwrap();
        let pages = listings
            .get(&category.remote_id)
            .ok_or_else(|| SyncError::http("fake://index", "no listing configured"))?;
        let entries = pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();
        Ok(IndexPage {
            entries,
            last_page: u32::try_from(pages.len()).unwrap(),
        })
    }

    async fn fetch_detail_page(&self, url: &str) -> Result<DetailFetch, SyncError> {
        self.detail_calls.lock().unwrap().push(url.to_string());
        if self.failing.lock().unwrap().contains(url) {
            return Err(SyncError::http(url, "connection reset"));
        }
        self.details
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::http(url, "no detail configured"))
    }
}

/// Throwaway inventory root with one category laid out
pub struct TestInventory {
    pub dir: TempDir,
    pub paths: InventoryPaths,
    pub repository: Arc<FsSnapshotRepository>,
}

impl TestInventory {
    pub async fn new(category: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let paths = InventoryPaths::new(dir.path(), category);
        paths.ensure_layout().await.unwrap();
        let repository = Arc::new(FsSnapshotRepository::new(paths.clone()));
        Self {
            dir,
            paths,
            repository,
        }
    }
}
