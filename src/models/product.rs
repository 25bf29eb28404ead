use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::RecordStatus;
use crate::utils::error::ValidationError;

const MAX_NAME_LEN: usize = 60;

/// One row of the watchlist, keyed by URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    pub url: String,
    /// Unset until registration supplies one or the first extraction succeeds.
    pub name: Option<String>,
    pub target_price: Decimal,
    pub current_price: Option<Decimal>,
    /// Price at which the last alert for this record went out.
    pub last_alerted: Option<Decimal>,
    pub status: RecordStatus,
}

impl ProductRecord {
    pub fn new(watch: NewWatch) -> Self {
        Self {
            url: watch.url,
            name: watch.name.map(|n| truncate_name(&n)),
            target_price: watch.target_price,
            current_price: None,
            last_alerted: None,
            status: RecordStatus::Active,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => url::Url::parse(&self.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| format!("Product ({})", h.trim_start_matches("www."))))
                .unwrap_or_else(|| self.url.clone()),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.status == RecordStatus::Paused
    }

    /// At or below target with a known price.
    pub fn is_below_target(&self) -> bool {
        matches!(self.current_price, Some(current) if current <= self.target_price)
    }
}

/// A validated `/add` request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct NewWatch {
    #[validate(url)]
    pub url: String,
    pub target_price: Decimal,
    pub name: Option<String>,
}

impl NewWatch {
    pub fn new(url: impl Into<String>, target_price: Decimal) -> Result<Self, ValidationError> {
        let watch = Self {
            url: url.into().trim().to_string(),
            target_price,
            name: None,
        };
        watch.validate()?;
        if !(watch.url.starts_with("http://") || watch.url.starts_with("https://")) {
            return Err(ValidationError::InvalidUrl(watch.url));
        }
        if watch.target_price <= Decimal::ZERO {
            return Err(ValidationError::InvalidTargetPrice(watch.target_price.to_string()));
        }
        Ok(watch)
    }
}

pub fn truncate_name(name: &str) -> String {
    let name = name.trim();
    if name.chars().count() > MAX_NAME_LEN {
        let head: String = name.chars().take(MAX_NAME_LEN - 3).collect();
        format!("{}...", head.trim_end())
    } else {
        name.to_string()
    }
}
