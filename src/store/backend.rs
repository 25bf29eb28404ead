use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{PriceHistoryEntry, ProductRecord, RecordStatus};
use crate::utils::error::StoreError;

/// Cell-level changes to one product row. `None` leaves a cell untouched;
/// the nested options on nullable cells distinguish "clear" from "keep".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub target_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub last_alerted: Option<Option<Decimal>>,
    pub status: Option<RecordStatus>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self == &ProductPatch::default()
    }

    pub fn apply(&self, record: &mut ProductRecord) {
        if let Some(name) = &self.name {
            record.name = Some(name.clone());
        }
        if let Some(target) = self.target_price {
            record.target_price = target;
        }
        if let Some(current) = self.current_price {
            record.current_price = Some(current);
        }
        if let Some(last_alerted) = self.last_alerted {
            record.last_alerted = last_alerted;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}

/// The tabular protocol the watchlist is kept in: product rows keyed by
/// URL, scalar settings, and an append-only history sheet.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &str;

    /// All product rows in insertion order.
    async fn read_products(&self) -> Result<Vec<ProductRecord>, StoreError>;

    async fn append_product(&self, record: &ProductRecord) -> Result<(), StoreError>;

    /// Returns `false` when no row has this URL.
    async fn update_product(&self, url: &str, patch: &ProductPatch) -> Result<bool, StoreError>;

    async fn read_setting(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn write_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn append_history(&self, entry: &PriceHistoryEntry) -> Result<(), StoreError>;

    /// Most recent entries for `url`, newest first.
    async fn read_history(&self, url: &str, limit: usize) -> Result<Vec<PriceHistoryEntry>, StoreError>;
}
