use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::extractor::PriceExtractor;
use crate::models::{PriceHistoryEntry, ProductRecord};
use crate::store::ProductStore;
use crate::utils::error::{ExtractionError, StoreError};

/// Why a record kept its stored price this cycle.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One record after its price check. `record` reflects what was written.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub record: ProductRecord,
    pub updated: bool,
    pub error: Option<RefreshError>,
}

impl RefreshOutcome {
    fn skipped(record: ProductRecord) -> Self {
        Self {
            record,
            updated: false,
            error: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
    pub paused: usize,
}

impl RefreshSummary {
    pub fn of(outcomes: &[RefreshOutcome]) -> Self {
        let mut summary = RefreshSummary::default();
        for outcome in outcomes {
            if outcome.record.is_paused() {
                summary.paused += 1;
                continue;
            }
            summary.checked += 1;
            if outcome.updated {
                summary.updated += 1;
            } else if outcome.error.is_some() {
                summary.failed += 1;
            }
        }
        summary
    }
}

/// Fetches a fresh price for every active record.
pub struct PriceRefresher {
    store: ProductStore,
    extractor: Arc<PriceExtractor>,
    max_concurrent: usize,
}

impl PriceRefresher {
    pub fn new(store: ProductStore, extractor: Arc<PriceExtractor>, max_concurrent: usize) -> Self {
        Self {
            store,
            extractor,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Fetches run up to `max_concurrent` at a time; results and store writes
    /// are applied one by one in the store's order. Paused records are
    /// returned untouched.
    pub async fn refresh(&self, records: Vec<ProductRecord>) -> Vec<RefreshOutcome> {
        let total = records.len();
        let extractor = &self.extractor;

        let mut fetched = stream::iter(records.into_iter().enumerate())
            .map(|(i, record)| async move {
                if record.is_paused() {
                    tracing::info!("[{}/{}] {} paused, skipping", i + 1, total, record.display_name());
                    return (record, None);
                }
                let started = Instant::now();
                let result = extractor.extract(&record.url).await;
                tracing::debug!(
                    "[{}/{}] {} checked in {}ms",
                    i + 1,
                    total,
                    record.url,
                    started.elapsed().as_millis()
                );
                (record, Some(result))
            })
            .buffered(self.max_concurrent);

        let mut outcomes = Vec::with_capacity(total);
        while let Some((record, result)) = fetched.next().await {
            let outcome = match result {
                None => RefreshOutcome::skipped(record),
                Some(Ok(info)) => self.apply(record, info.name, info.price).await,
                Some(Err(err)) => {
                    tracing::warn!("Price check failed for {}: {}", record.url, err);
                    RefreshOutcome {
                        record,
                        updated: false,
                        error: Some(RefreshError::Extraction(err)),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn apply(
        &self,
        mut record: ProductRecord,
        name: Option<String>,
        price: rust_decimal::Decimal,
    ) -> RefreshOutcome {
        if let Err(err) = self.store.update_price(&record.url, price).await {
            tracing::warn!("Could not store price for {}: {}", record.url, err);
            return RefreshOutcome {
                record,
                updated: false,
                error: Some(RefreshError::Store(err)),
            };
        }
        tracing::info!(
            "{}: {} (target {}){}",
            record.display_name(),
            price,
            record.target_price,
            if price <= record.target_price { " below target" } else { "" }
        );
        record.current_price = Some(price);

        if let Some(name) = name {
            match self.store.set_name_if_missing(&record, &name).await {
                Ok(true) => record.name = Some(name),
                Ok(false) => {}
                Err(err) => tracing::warn!("Could not store name for {}: {}", record.url, err),
            }
        }

        let entry = PriceHistoryEntry::new(record.url.clone(), record.display_name(), price, record.target_price);
        if let Err(err) = self.store.record_history(&entry).await {
            tracing::warn!("Could not append history for {}: {}", record.url, err);
        }

        RefreshOutcome {
            record,
            updated: true,
            error: None,
        }
    }
}
