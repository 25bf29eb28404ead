use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod product;
pub mod command;
pub mod alert;
pub mod price_history;
pub mod system_setting;

// Re-exports for convenience
pub use product::*;
pub use command::*;
pub use alert::*;
pub use price_history::*;
pub use system_setting::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Paused,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "active" => Ok(RecordStatus::Active),
            "paused" => Ok(RecordStatus::Paused),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// Whether a record that stays below target alerts again on the next cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Alert on every cycle the price is at or below target.
    #[default]
    EveryCycle,
    /// Alert once per price; re-arm when the price goes back above target.
    OnChange,
}
