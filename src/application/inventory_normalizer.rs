//! Builds `normalized.json`, the frontend-facing view of one category
//!
//! Rebuilt from scratch on every run from the working listing and the
//! snapshot each row reconciled to.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::domain::errors::SyncError;
use crate::domain::inventory::{IndexEntry, NormalizedInventory, NormalizedItem, ProductId, ProductSnapshot};
use crate::domain::services::AttributeNormalizer;
use crate::infrastructure::inventory_paths::InventoryPaths;

pub struct InventoryNormalizer {
    normalizer: Arc<dyn AttributeNormalizer>,
    storage_base_url: String,
}

impl InventoryNormalizer {
    pub fn new(normalizer: Arc<dyn AttributeNormalizer>, storage_base_url: &str) -> Self {
        Self {
            normalizer,
            storage_base_url: storage_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One item per listing row that has a snapshot, in listing order
    pub fn build(
        &self,
        category: &str,
        entries: &[IndexEntry],
        snapshots: &HashMap<ProductId, ProductSnapshot>,
        index_fetched_at: SystemTime,
    ) -> NormalizedInventory {
        let inventory = entries
            .iter()
            .filter_map(|entry| match snapshots.get(&entry.id) {
                Some(snapshot) => Some(self.normalize_item(category, entry, snapshot)),
                None => {
                    warn!("[{}] No snapshot for {}, leaving it out of normalized output", category, entry.id);
                    None
                }
            })
            .collect();

        NormalizedInventory {
            index_file_modification_timestamp: unix_seconds(index_fetched_at),
            inventory,
        }
    }

    fn normalize_item(&self, category: &str, entry: &IndexEntry, snapshot: &ProductSnapshot) -> NormalizedItem {
        let (city, local_address) = split_address(&entry.branch.address);
        let images = snapshot
            .attributes
            .image_paths()
            .iter()
            .map(|path| format!("{}/{}", self.storage_base_url, path.trim_start_matches('/')))
            .collect();

        NormalizedItem {
            article: entry.article.clone(),
            id: entry.id.clone(),
            title: entry.title.clone(),
            price: entry.price.as_f64(),
            fields: self.normalizer.normalize(category, &snapshot.attributes),
            city,
            local_address,
            url: entry.url.clone(),
            images,
            timestamp: snapshot.timestamp.to_rfc3339(),
        }
    }
}

/// Branch addresses look like `Rīga<br>Brīvības iela 1`; older rows use a comma
fn split_address(address: &str) -> (String, String) {
    let mut parts: Vec<&str> = address.split("<br>").collect();
    if parts.len() < 2 {
        parts = address.split(',').collect();
    }
    let clean = |part: Option<&&str>| part.map(|p| p.trim_matches([' ', ',']).to_string()).unwrap_or_default();
    (clean(parts.first()), clean(parts.get(1)))
}

fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH).map_or(0.0, |d| d.as_secs_f64())
}

pub async fn persist_normalized(paths: &InventoryPaths, inventory: &NormalizedInventory) -> Result<(), SyncError> {
    let path = paths.normalized_file();
    let content = serde_json::to_vec_pretty(inventory).map_err(|source| SyncError::Decode {
        what: path.display().to_string(),
        source,
    })?;
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| SyncError::io(&path, e))?;
    info!(
        "[{}] Dumping {} products to {}",
        paths.category(),
        inventory.inventory.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timestamp::SnapshotTimestamp;
    use crate::infrastructure::attribute_normalizer::RuleBasedNormalizer;
    use crate::test_utils::{detail_payload, index_entry};
    use std::time::Duration;

    fn normalizer() -> InventoryNormalizer {
        InventoryNormalizer::new(
            Arc::new(RuleBasedNormalizer::banknote_defaults().unwrap()),
            "https://shop.test/storage/",
        )
    }

    #[test]
    fn test_address_split() {
        assert_eq!(
            split_address("Rīga<br>Brīvības iela 1"),
            ("Rīga".to_string(), "Brīvības iela 1".to_string())
        );
        assert_eq!(
            split_address("Liepāja, Lielā iela 5,"),
            ("Liepāja".to_string(), "Lielā iela 5".to_string())
        );
        assert_eq!(split_address("Online"), ("Online".to_string(), String::new()));
    }

    #[test]
    fn test_build_follows_listing_and_skips_rows_without_snapshot() {
        let entries = vec![index_entry(2, 2, "149.99"), index_entry(1, 1, "99.00"), index_entry(3, 3, "5.00")];
        let timestamp = SnapshotTimestamp::parse("2024-05-01_12-00-00").unwrap();
        let snapshots: HashMap<_, _> = [1_u64, 2]
            .into_iter()
            .map(|id| {
                let snapshot =
                    ProductSnapshot::new(ProductId::Number(id), "laptops", timestamp, detail_payload(id, "1.00"));
                (ProductId::Number(id), snapshot)
            })
            .collect();
        let fetched_at = UNIX_EPOCH + Duration::from_millis(1_714_564_800_500);

        let normalized = normalizer().build("laptops", &entries, &snapshots, fetched_at);

        assert!((normalized.index_file_modification_timestamp - 1_714_564_800.5).abs() < 1e-6);
        let ids: Vec<_> = normalized.inventory.iter().map(|item| item.id.clone()).collect();
        assert_eq!(ids, vec![ProductId::Number(2), ProductId::Number(1)]);

        let item = &normalized.inventory[0];
        assert_eq!(item.price, Some(149.99));
        assert_eq!(item.fields["cpu"], "Intel Core i5-8250U");
        assert_eq!(item.fields["ram"], "8 GB");
        assert_eq!(item.city, "Rīga");
        assert_eq!(item.images, vec!["https://shop.test/storage/products/2/front.jpg"]);
        assert_eq!(item.timestamp, "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_serialized_item_flattens_fields() {
        let entries = vec![index_entry(1, 1, "10.00")];
        let timestamp = SnapshotTimestamp::parse("2024-05-01_12-00-00").unwrap();
        let snapshots = HashMap::from([(
            ProductId::Number(1),
            ProductSnapshot::new(ProductId::Number(1), "laptops", timestamp, detail_payload(1, "10.00")),
        )]);

        let normalized = normalizer().build("laptops", &entries, &snapshots, UNIX_EPOCH);
        let value = serde_json::to_value(&normalized).unwrap();

        let item = &value["inventory"][0];
        assert_eq!(item["cpu"], "Intel Core i5-8250U");
        assert_eq!(item["local_address"], "Brīvības iela 1");
        assert_eq!(item["price"], 10.0);
    }
}
