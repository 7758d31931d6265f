//! Remote catalog client for the Banknote shop
//!
//! Listing: `GET <index_url>?categories_id=<id>&per_page=<n>&page=<p>` returning
//! `{ "data": [...], "last_page": N }`. Detail: the item's own page, parsed
//! by [`DetailPageParser`].

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::category::CategoryDef;
use crate::domain::errors::SyncError;
use crate::domain::inventory::decode_index_rows;
use crate::domain::services::{CatalogSource, DetailFetch, IndexPage};
use crate::infrastructure::config::RemoteConfig;
use crate::infrastructure::detail_page_parser::{DetailPageParser, Extraction};
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};

/// Listing page as the server sends it. Rows stay raw until
/// [`decode_index_rows`] so one bad row only costs that row.
#[derive(Debug, Deserialize)]
pub struct IndexPageResponse {
    pub data: Vec<Value>,
    pub last_page: u32,
}

impl From<IndexPageResponse> for IndexPage {
    fn from(response: IndexPageResponse) -> Self {
        Self {
            entries: decode_index_rows(response.data, "listing page"),
            last_page: response.last_page,
        }
    }
}

pub struct BanknoteCatalog {
    http: HttpClient,
    parser: DetailPageParser,
    index_url: String,
    per_page: u32,
}

impl BanknoteCatalog {
    pub fn new(http: HttpClient, remote: &RemoteConfig) -> Result<Self, SyncError> {
        Ok(Self {
            http,
            parser: DetailPageParser::new()?,
            index_url: remote.index_url.clone(),
            per_page: remote.per_page,
        })
    }

    /// Build the client and initialize the session cookies
    pub async fn connect(remote: &RemoteConfig) -> Result<Self, SyncError> {
        let http = HttpClient::new(HttpClientConfig::from_remote_config(remote))?;
        http.warm_up(&remote.home_url).await?;
        Self::new(http, remote)
    }

    fn classify(&self, url: &str, html: &str) -> DetailFetch {
        match self.parser.extract(html) {
            Extraction::Product(attributes) => DetailFetch::Found(attributes),
            Extraction::NoProductInfo => DetailFetch::NotFound {
                reason: "page has no product info, probably sold".to_string(),
            },
            Extraction::InvalidPayload(reason) => {
                warn!("Unusable product payload at {}: {}", url, reason);
                DetailFetch::NotFound { reason }
            }
        }
    }
}

#[async_trait]
impl CatalogSource for BanknoteCatalog {
    async fn fetch_index_page(&self, category: &CategoryDef, page: u32) -> Result<IndexPage, SyncError> {
        let query = [
            ("categories_id", category.remote_id.to_string()),
            ("per_page", self.per_page.to_string()),
            ("page", page.to_string()),
        ];
        let response: IndexPageResponse = self.http.get_json(&self.index_url, &query).await?;
        debug!(
            "[DL/{}] page {} returned {} entries (last page {})",
            category.name,
            page,
            response.data.len(),
            response.last_page
        );
        Ok(response.into())
    }

    async fn fetch_detail_page(&self, url: &str) -> Result<DetailFetch, SyncError> {
        let response = self.http.get(url).await?;
        let status = response.status();

        if status == StatusCode::MOVED_PERMANENTLY {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("<unknown>")
                .to_string();
            info!("↪️ {} redirected to {}", url, location);
            return Ok(DetailFetch::NotFound {
                reason: format!("redirected to {location}"),
            });
        }
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            return Ok(DetailFetch::NotFound {
                reason: format!("status {status}"),
            });
        }
        if !status.is_success() {
            return Err(SyncError::http(url, format!("status {status}")));
        }

        let html = response.text().await.map_err(|e| SyncError::http(url, e))?;
        Ok(self.classify(url, &html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_page_response_decodes() {
        let body = json!({
            "current_page": 1,
            "last_page": 3,
            "data": [{
                "id": 11,
                "article": 5001,
                "title": "Dell Latitude 5490",
                "price": "249.00",
                "url": "https://shop.test/lv/products/11",
                "branche": {"address": "Rīga<br>Brīvības iela 1", "phone": "+371"}
            }]
        });

        let response: IndexPageResponse = serde_json::from_value(body).unwrap();
        let page = IndexPage::from(response);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].branch.address, "Rīga<br>Brīvības iela 1");
    }

    #[test]
    fn test_bad_listing_row_does_not_sink_the_page() {
        let body = json!({
            "last_page": 1,
            "data": [
                {"id": 11, "article": 5001, "price": "249.00", "branche": {}},
                {
                    "id": 12,
                    "article": 5002,
                    "price": "199.00",
                    "url": "https://shop.test/lv/products/12",
                    "branche": {"address": "Liepāja"}
                },
                {
                    "id": "../../etc",
                    "article": 5003,
                    "price": "1.00",
                    "url": "https://shop.test/lv/products/13",
                    "branche": {}
                }
            ]
        });

        let page = IndexPage::from(serde_json::from_value::<IndexPageResponse>(body).unwrap());

        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].url, "https://shop.test/lv/products/12");
    }

    #[test]
    fn test_sold_page_is_not_found() {
        let http = HttpClient::new(HttpClientConfig::default()).unwrap();
        let catalog = BanknoteCatalog::new(http, &RemoteConfig::default()).unwrap();

        assert!(matches!(
            catalog.classify("https://shop.test/x", "<html></html>"),
            DetailFetch::NotFound { .. }
        ));
        assert!(matches!(
            catalog.classify("https://shop.test/x", r#"<buy-now-btn :product='{"id":1}'></buy-now-btn>"#),
            DetailFetch::Found(_)
        ));
    }
}
