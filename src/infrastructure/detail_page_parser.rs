//! Product payload extraction from detail pages
//!
//! The shop renders product data into a Vue component attribute (`:product`).
//! Two templates have been seen in the wild:
//! - `<product-item-leasing :product="...">` (older template)
//! - `<buy-now-btn :product="...">` (current template)

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::domain::errors::SyncError;
use crate::domain::inventory::RawAttributes;

const PRODUCT_ATTRIBUTE: &str = ":product";

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Product(RawAttributes),
    /// No product component on the page (sold or withdrawn)
    NoProductInfo,
    /// Component present but its payload is empty or not a JSON object
    InvalidPayload(String),
}

pub struct DetailPageParser {
    selectors: Vec<(&'static str, Selector)>,
}

impl DetailPageParser {
    pub fn new() -> Result<Self, SyncError> {
        let selectors = ["product-item-leasing", "buy-now-btn"]
            .into_iter()
            .map(|name| {
                Selector::parse(name)
                    .map(|selector| (name, selector))
                    .map_err(|e| SyncError::Config(format!("Invalid selector '{name}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    pub fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);

        // 템플릿 순서대로 첫 번째 :product 속성을 사용
        let payload = self.selectors.iter().find_map(|(name, selector)| {
            let value = document
                .select(selector)
                .find_map(|element| element.value().attr(PRODUCT_ATTRIBUTE))?;
            debug!("Product payload found in <{}>", name);
            Some(value)
        });

        let Some(payload) = payload else {
            return Extraction::NoProductInfo;
        };
        if payload.trim().is_empty() {
            return Extraction::InvalidPayload("empty product payload".to_string());
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value @ Value::Object(_)) => Extraction::Product(RawAttributes(value)),
            Ok(other) => Extraction::InvalidPayload(format!("payload is not an object: {other}")),
            Err(e) => Extraction::InvalidPayload(format!("payload is not valid JSON: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> DetailPageParser {
        DetailPageParser::new().unwrap()
    }

    #[test]
    fn test_current_template() {
        let html = r#"<html><body>
            <buy-now-btn :product="{&quot;id&quot;:7,&quot;price&quot;:&quot;199.00&quot;}"></buy-now-btn>
        </body></html>"#;

        match parser().extract(html) {
            Extraction::Product(attributes) => {
                assert_eq!(attributes.0["id"], 7);
                assert_eq!(attributes.0["price"], "199.00");
            }
            other => panic!("unexpected extraction: {other:?}"),
        }
    }

    #[test]
    fn test_older_template_takes_precedence() {
        let html = r#"<div>
            <product-item-leasing :product='{"id": 1}'></product-item-leasing>
            <buy-now-btn :product='{"id": 2}'></buy-now-btn>
        </div>"#;

        assert!(matches!(
            parser().extract(html),
            Extraction::Product(RawAttributes(ref v)) if v["id"] == 1
        ));
    }

    #[test]
    fn test_leasing_without_payload_falls_back() {
        let html = r#"<product-item-leasing></product-item-leasing>
            <buy-now-btn :product='{"id": 2}'></buy-now-btn>"#;

        assert!(matches!(
            parser().extract(html),
            Extraction::Product(RawAttributes(ref v)) if v["id"] == 2
        ));
    }

    #[test]
    fn test_sold_page_has_no_product_info() {
        assert_eq!(parser().extract("<p>Prece pārdota</p>"), Extraction::NoProductInfo);
    }

    #[test]
    fn test_empty_and_broken_payloads() {
        assert!(matches!(
            parser().extract(r#"<buy-now-btn :product=""></buy-now-btn>"#),
            Extraction::InvalidPayload(_)
        ));
        assert!(matches!(
            parser().extract(r#"<buy-now-btn :product="{oops"></buy-now-btn>"#),
            Extraction::InvalidPayload(_)
        ));
    }
}
