use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::element_finder::ElementFinder;
use crate::utils::error::ExtractionError;

/// What one extraction yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: Option<String>,
    pub price: rust_decimal::Decimal,
}

/// Extraction rules for one retailer, selected by the page's host.
pub trait RetailerPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    /// Whether this plugin owns `host` (already lowercased, `www.` kept).
    fn matches_host(&self, host: &str) -> bool;

    /// Tried in order after structured data and before meta tags.
    fn title_selectors(&self) -> &[&'static str];
    fn price_selectors(&self) -> &[&'static str];

    fn extract(&self, finder: &ElementFinder, html: &str) -> Result<ProductInfo, ExtractionError> {
        let document = Html::parse_document(html);

        let price = finder.find_price(&document, html, self.price_selectors())?;
        let title = finder.find_title(&document, self.title_selectors());

        tracing::debug!(
            "{}: price {} via {:?}, title via {:?}",
            self.plugin_type(),
            price.value,
            price.strategy,
            title.as_ref().map(|t| t.strategy)
        );

        Ok(ProductInfo {
            name: title.map(|t| t.value),
            price: price.value,
        })
    }
}

/// `amazon.in`, `www.amazon.co.uk`, `smile.amazon.com`: any label equal to
/// `brand` followed by a public suffix.
pub fn host_has_brand(host: &str, brand: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    labels
        .iter()
        .position(|label| *label == brand)
        .is_some_and(|idx| idx + 1 < labels.len())
}
