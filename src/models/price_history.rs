use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One successful price observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub url: String,
    pub name: String,
    pub price: Decimal,
    pub target_price: Decimal,
}

impl PriceHistoryEntry {
    pub fn new(url: String, name: String, price: Decimal, target_price: Decimal) -> Self {
        Self {
            recorded_at: Utc::now(),
            url,
            name,
            price,
            target_price,
        }
    }
}
