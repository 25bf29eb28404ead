use std::sync::Arc;
use tokio::sync::RwLock;

use super::retailers::{AmazonRetailer, FlipkartRetailer};
use super::traits::RetailerPlugin;
use crate::utils::error::ExtractionError;

pub type RetailerPluginRef = Arc<dyn RetailerPlugin>;

/// Host-to-plugin dispatch for extraction rules.
#[derive(Clone, Default)]
pub struct RetailerRegistry {
    retailers: Arc<RwLock<Vec<RetailerPluginRef>>>,
}

impl RetailerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in retailer.
    pub async fn with_default_retailers() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(AmazonRetailer::new())).await;
        registry.register(Arc::new(FlipkartRetailer::new())).await;
        registry
    }

    /// Later registrations win over earlier ones for the same host.
    pub async fn register(&self, plugin: RetailerPluginRef) {
        tracing::debug!("Registering retailer plugin {}", plugin.plugin_type());
        let mut retailers = self.retailers.write().await;
        retailers.insert(0, plugin);
    }

    pub async fn list_retailer_types(&self) -> Vec<String> {
        let retailers = self.retailers.read().await;
        retailers.iter().map(|r| r.plugin_type().to_string()).collect()
    }

    /// The plugin owning `url`'s host.
    pub async fn find_for_url(&self, url: &str) -> Result<RetailerPluginRef, ExtractionError> {
        let parsed = url::Url::parse(url).map_err(|e| ExtractionError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| ExtractionError::InvalidUrl(format!("{} has no host", url)))?;

        let retailers = self.retailers.read().await;
        retailers
            .iter()
            .find(|r| r.matches_host(&host))
            .cloned()
            .ok_or(ExtractionError::UnsupportedRetailer { host })
    }

    pub async fn supports(&self, url: &str) -> bool {
        self.find_for_url(url).await.is_ok()
    }
}
