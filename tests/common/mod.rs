//! Shared fixtures for the pipeline integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use inventory_sync_lib::application::{SyncCoordinator, SyncSettings};
use inventory_sync_lib::domain::{
    ArticleKey, Branch, CatalogSource, CategoryDef, CategoryRegistry, DetailFetch, IndexEntry, IndexPage, Price,
    ProductId, RawAttributes, SyncError,
};
use inventory_sync_lib::infrastructure::RuleBasedNormalizer;

pub fn product_url(id: u64) -> String {
    format!("https://shop.test/lv/products/{id}")
}

pub fn index_entry(id: u64, price: &str) -> IndexEntry {
    IndexEntry {
        id: ProductId::Number(id),
        article: ArticleKey::Number(i64::try_from(id).unwrap()),
        title: format!("ThinkPad #{id}"),
        price: Price::Text(price.to_string()),
        url: product_url(id),
        branch: Branch {
            address: "Rīga<br>Brīvības iela 1".to_string(),
            extra: Map::new(),
        },
        extra: Map::new(),
    }
}

pub fn detail_payload(id: u64, price: &str) -> RawAttributes {
    RawAttributes(json!({
        "id": id,
        "price": price,
        "description_f": [
            {"title": "Procesors", "value": "Intel Core i7-8650U"},
            {"title": "SSD disks", "value": "512 GB"}
        ],
        "erp_images": [{"path": format!("img/{id}.jpg")}]
    }))
}

/// In-memory shop: one listing per remote category id plus detail pages
#[derive(Default)]
pub struct FakeShop {
    listings: Mutex<HashMap<u32, Vec<IndexEntry>>>,
    details: Mutex<HashMap<String, DetailFetch>>,
    index_calls: AtomicUsize,
    detail_calls: Mutex<Vec<String>>,
}

impl FakeShop {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn list(&self, remote_id: u32, entries: Vec<IndexEntry>) {
        self.listings.lock().unwrap().insert(remote_id, entries);
    }

    pub fn detail(&self, id: u64, price: &str) {
        self.details
            .lock()
            .unwrap()
            .insert(product_url(id), DetailFetch::Found(detail_payload(id, price)));
    }

    pub fn sold(&self, id: u64) {
        self.details.lock().unwrap().insert(
            product_url(id),
            DetailFetch::NotFound {
                reason: "page has no product info".to_string(),
            },
        );
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSource for FakeShop {
    async fn fetch_index_page(&self, category: &CategoryDef, page: u32) -> Result<IndexPage, SyncError> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self
            .listings
            .lock()
            .unwrap()
            .get(&category.remote_id)
            .cloned()
            .ok_or_else(|| SyncError::http("https://shop.test/lv/filter-products", "status 503 Service Unavailable"))?;
        Ok(IndexPage {
            entries: if page == 1 { entries } else { Vec::new() },
            last_page: 1,
        })
    }

    async fn fetch_detail_page(&self, url: &str) -> Result<DetailFetch, SyncError> {
        self.detail_calls.lock().unwrap().push(url.to_string());
        self.details
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| SyncError::http(url, "status 500 Internal Server Error"))
    }
}

/// Temporary inventory root plus a coordinator wired to a [`FakeShop`]
pub struct Harness {
    pub dir: TempDir,
    pub shop: Arc<FakeShop>,
    pub archive_cap_bytes: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            shop: FakeShop::new(),
            archive_cap_bytes: 2048 * 1024 * 1024,
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("inventory")
    }

    pub fn laptops(&self) -> PathBuf {
        self.root().join("laptops")
    }

    pub fn coordinator(&self) -> SyncCoordinator {
        let settings = SyncSettings {
            inventory_root: self.root(),
            delay: Duration::ZERO,
            index_ttl: Duration::from_secs(55 * 60),
            lock_stale_after: Duration::from_secs(24 * 3600),
            legacy_retention: Duration::from_secs(30 * 86_400),
            archive_cap_bytes: self.archive_cap_bytes,
            storage_base_url: "https://shop.test/storage".to_string(),
        };
        let registry = CategoryRegistry::new(vec![CategoryDef::new("laptops", 8), CategoryDef::new("monitors", 11)]);
        SyncCoordinator::new(
            settings,
            registry,
            self.shop.clone(),
            Arc::new(RuleBasedNormalizer::banknote_defaults().unwrap()),
        )
    }

    pub async fn sync_laptops(&self) -> Result<inventory_sync_lib::application::SyncReport, SyncError> {
        self.coordinator().run(&["laptops".to_string()]).await
    }
}

pub fn snapshot_names(product_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(product_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".json"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub fn write_json(path: &Path, value: &RawAttributes) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}
