use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::backend::{ProductPatch, StorageBackend};
use crate::models::{PriceHistoryEntry, ProductRecord};
use crate::utils::error::StoreError;

#[derive(Default)]
struct Tables {
    products: Vec<ProductRecord>,
    settings: HashMap<String, String>,
    history: Vec<PriceHistoryEntry>,
}

/// Process-local backend for tests and dry runs.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_products(&self) -> Result<Vec<ProductRecord>, StoreError> {
        Ok(self.tables.read().await.products.clone())
    }

    async fn append_product(&self, record: &ProductRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.products.iter().any(|p| p.url == record.url) {
            return Err(StoreError::Duplicate {
                url: record.url.clone(),
            });
        }
        tables.products.push(record.clone());
        Ok(())
    }

    async fn update_product(&self, url: &str, patch: &ProductPatch) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.products.iter_mut().find(|p| p.url == url) {
            Some(record) => {
                patch.apply(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn read_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.tables.read().await.settings.get(key).cloned())
    }

    async fn write_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<(), StoreError> {
        self.tables.write().await.history.push(entry.clone());
        Ok(())
    }

    async fn read_history(&self, url: &str, limit: usize) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .iter()
            .rev()
            .filter(|e| e.url == url)
            .take(limit)
            .cloned()
            .collect())
    }
}
