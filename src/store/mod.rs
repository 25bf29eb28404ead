pub mod backend;
pub mod memory;
pub mod sqlite;

pub use backend::{ProductPatch, StorageBackend};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::models::{parse_offset, NewWatch, PriceHistoryEntry, ProductRecord, RecordStatus, SettingKey};
use crate::utils::error::StoreError;

/// Record-level operations over the watchlist. URL is the key: there is at
/// most one record per URL and registration never duplicates.
#[derive(Clone)]
pub struct ProductStore {
    backend: Arc<dyn StorageBackend>,
}

impl ProductStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Every record, in registration order.
    pub async fn list(&self) -> Result<Vec<ProductRecord>, StoreError> {
        self.backend.read_products().await
    }

    pub async fn get(&self, url: &str) -> Result<Option<ProductRecord>, StoreError> {
        Ok(self.list().await?.into_iter().find(|r| r.url == url))
    }

    /// Inserts a new record, or updates the target of the existing one with
    /// the same URL. The flag is `true` when a record was created.
    pub async fn upsert(&self, watch: NewWatch) -> Result<(ProductRecord, bool), StoreError> {
        if let Some(mut existing) = self.get(&watch.url).await? {
            let patch = ProductPatch {
                target_price: Some(watch.target_price),
                name: watch.name.filter(|_| existing.name.is_none()),
                ..Default::default()
            };
            if !self.backend.update_product(&existing.url, &patch).await? {
                return Err(StoreError::NotFound { url: existing.url });
            }
            patch.apply(&mut existing);
            return Ok((existing, false));
        }

        let record = ProductRecord::new(watch);
        self.backend.append_product(&record).await?;
        Ok((record, true))
    }

    /// Sets the current price. Fails with `NotFound` for an unknown URL.
    pub async fn update_price(&self, url: &str, price: Decimal) -> Result<(), StoreError> {
        self.patch(url, ProductPatch {
            current_price: Some(price),
            ..Default::default()
        })
        .await
    }

    /// Fills in a display name on records registered without one.
    pub async fn set_name_if_missing(&self, record: &ProductRecord, name: &str) -> Result<bool, StoreError> {
        if record.name.is_some() || name.trim().is_empty() {
            return Ok(false);
        }
        self.patch(&record.url, ProductPatch {
            name: Some(name.to_string()),
            ..Default::default()
        })
        .await?;
        Ok(true)
    }

    /// Replaces the target price; the current price and alert marker stay.
    pub async fn set_target(&self, url: &str, target_price: Decimal) -> Result<(), StoreError> {
        self.patch(url, ProductPatch {
            target_price: Some(target_price),
            ..Default::default()
        })
        .await
    }

    pub async fn set_status(&self, url: &str, status: RecordStatus) -> Result<(), StoreError> {
        self.patch(url, ProductPatch {
            status: Some(status),
            ..Default::default()
        })
        .await
    }

    pub async fn mark_alerted(&self, url: &str, price: Decimal) -> Result<(), StoreError> {
        self.patch(url, ProductPatch {
            last_alerted: Some(Some(price)),
            ..Default::default()
        })
        .await
    }

    pub async fn clear_alerted(&self, url: &str) -> Result<(), StoreError> {
        self.patch(url, ProductPatch {
            last_alerted: Some(None),
            ..Default::default()
        })
        .await
    }

    /// Highest chat update id already consumed; 0 before the first ingest.
    pub async fn command_offset(&self) -> Result<i64, StoreError> {
        let value = self.backend.read_setting(SettingKey::LastUpdateId.as_str()).await?;
        Ok(parse_offset(value.as_deref()))
    }

    pub async fn set_command_offset(&self, update_id: i64) -> Result<(), StoreError> {
        self.backend
            .write_setting(SettingKey::LastUpdateId.as_str(), &update_id.to_string())
            .await
    }

    pub async fn record_history(&self, entry: &PriceHistoryEntry) -> Result<(), StoreError> {
        self.backend.append_history(entry).await
    }

    pub async fn history(&self, url: &str, limit: usize) -> Result<Vec<PriceHistoryEntry>, StoreError> {
        self.backend.read_history(url, limit).await
    }

    async fn patch(&self, url: &str, patch: ProductPatch) -> Result<(), StoreError> {
        if self.backend.update_product(url, &patch).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound { url: url.to_string() })
        }
    }
}
