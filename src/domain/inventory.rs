use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::domain::timestamp::SnapshotTimestamp;

/// Catalog item id as reported by the listing (numeric on the live shop).
///
/// The id names the record directory, so text ids that are not a single
/// plain path component are rejected when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ProductId {
    Number(u64),
    Text(String),
}

impl ProductId {
    /// Record directories are named after the id. Only canonical digits
    /// become numbers, so `"007"` stays text and maps back to `007/`.
    pub fn from_dir_name(name: &str) -> Self {
        match name.parse::<u64>() {
            Ok(number) if number.to_string() == name => Self::Number(number),
            _ => Self::Text(name.to_string()),
        }
    }

    pub fn is_safe_path_component(text: &str) -> bool {
        !text.is_empty()
            && text != "."
            && text != ".."
            && !text.contains(['/', '\\', '\0'])
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(number) => Ok(Self::Number(number)),
            Repr::Text(text) if Self::is_safe_path_component(&text) => Ok(Self::Text(text)),
            Repr::Text(text) => Err(D::Error::custom(format!("product id {text:?} is not a valid directory name"))),
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Stable creation-order key of an item ("article" in the listing)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleKey {
    Number(i64),
    Text(String),
}

impl Ord for ArticleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ArticleKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Price exactly as the remote reported it.
///
/// The listing sends `"299.00"` while detail pages may carry `299`, so
/// equality is numeric when both sides parse and textual otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Number(serde_json::Number),
    Text(String),
}

impl Price {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

impl PartialEq for Price {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self.as_text() == other.as_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default)]
    pub address: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of the remote listing. Unknown fields are kept so a rewritten
/// `index.json` still carries everything the remote sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: ProductId,
    pub article: ArticleKey,
    #[serde(default)]
    pub title: String,
    pub price: Price,
    pub url: String,
    #[serde(rename = "branche")]
    pub branch: Branch,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decode listing rows one at a time. A malformed row is logged and skipped
/// so it cannot take the rest of the listing down with it.
pub fn decode_index_rows(rows: Vec<Value>, source: &str) -> Vec<IndexEntry> {
    let total = rows.len();
    let entries: Vec<IndexEntry> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(position, row)| {
            let id = row.get("id").map(Value::to_string).unwrap_or_default();
            match serde_json::from_value::<IndexEntry>(row) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("⚠️ Skipping malformed listing row #{} (id {}) from {}: {}", position, id, source, e);
                    None
                }
            }
        })
        .collect();
    if entries.len() < total {
        warn!("⚠️ {} of {} listing rows from {} were skipped", total - entries.len(), total, source);
    }
    entries
}

/// `{title, value}` pair from the detail page's free-text spec table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEntry {
    pub title: String,
    pub value: String,
}

/// Detail-page payload stored verbatim as a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAttributes(pub Value);

impl RawAttributes {
    pub fn price(&self) -> Option<Price> {
        self.0
            .get("price")
            .and_then(|price| Price::deserialize(price).ok())
    }

    pub fn spec_entries(&self) -> Vec<SpecEntry> {
        let Some(entries) = self.0.get("description_f").and_then(Value::as_array) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                let title = value_as_text(entry.get("title")?);
                let value = entry.get("value").map(value_as_text).unwrap_or_default();
                Some(SpecEntry { title, value })
            })
            .collect()
    }

    pub fn image_paths(&self) -> Vec<String> {
        self.0
            .get("erp_images")
            .and_then(Value::as_array)
            .map(|images| {
                images
                    .iter()
                    .filter_map(|image| image.get("path").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One immutable capture of an item's detail attributes
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub category: String,
    pub timestamp: SnapshotTimestamp,
    pub attributes: RawAttributes,
    pub price: Option<Price>,
}

impl ProductSnapshot {
    pub fn new(
        product_id: ProductId,
        category: &str,
        timestamp: SnapshotTimestamp,
        attributes: RawAttributes,
    ) -> Self {
        let price = attributes.price();
        Self {
            product_id,
            category: category.to_string(),
            timestamp,
            attributes,
            price,
        }
    }
}

/// Structured attributes derived from the free-text spec table
pub type NormalizedFields = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub article: ArticleKey,
    pub id: ProductId,
    pub title: String,
    pub price: Option<f64>,
    #[serde(flatten)]
    pub fields: NormalizedFields,
    pub city: String,
    pub local_address: String,
    pub url: String,
    pub images: Vec<String>,
    pub timestamp: String,
}

/// Contents of `normalized.json`; rebuilt from scratch on every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedInventory {
    pub index_file_modification_timestamp: f64,
    pub inventory: Vec<NormalizedItem>,
}
