use std::sync::Arc;

use crate::element_finder::ElementFinder;
use crate::fetch::PageFetcher;
use crate::models::truncate_name;
use crate::plugins::{ProductInfo, RetailerRegistry};
use crate::utils::error::ExtractionError;

/// `extract(url) -> {name, price}`: fetch the page, pick the retailer's
/// rules by host, locate and normalize the values.
pub struct PriceExtractor {
    fetcher: Arc<dyn PageFetcher>,
    registry: RetailerRegistry,
    finder: ElementFinder,
}

impl PriceExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, registry: RetailerRegistry) -> Self {
        Self {
            fetcher,
            registry,
            finder: ElementFinder::new(),
        }
    }

    pub fn registry(&self) -> &RetailerRegistry {
        &self.registry
    }

    pub async fn extract(&self, url: &str) -> Result<ProductInfo, ExtractionError> {
        // Unsupported hosts fail before any network traffic.
        let retailer = self.registry.find_for_url(url).await?;

        let page = self.fetcher.fetch(url).await?;
        tracing::debug!(
            "Fetched {} via {}: HTTP {} | {} bytes | {}ms | json-ld: {}",
            url,
            self.fetcher.name(),
            page.status,
            page.body.len(),
            page.response_time_ms,
            page.body.contains("application/ld+json")
        );

        let mut info = retailer.extract(&self.finder, &page.body)?;
        info.name = info.name.map(|n| truncate_name(&n)).filter(|n| !n.is_empty());
        Ok(info)
    }
}
