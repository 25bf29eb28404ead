use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::ProductRecord;
use crate::price::format_amount;

/// A record that is at or below its target this cycle. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub record: ProductRecord,
    /// `target - current`; zero when the price sits exactly on target.
    pub drop_amount: Decimal,
}

/// The single consolidated message of one cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub alerts: Vec<AlertEvent>,
    pub generated_at: DateTime<FixedOffset>,
}

impl NotificationPayload {
    /// Telegram HTML rendering.
    pub fn render_html(&self, currency: &str) -> String {
        let mut lines = vec!["🔥 <b>Price Drop Alerts!</b>".to_string(), String::new()];

        for (i, alert) in self.alerts.iter().enumerate() {
            let record = &alert.record;
            let current = record.current_price.unwrap_or_default();
            lines.push(format!("{}. <b>{}</b>", i + 1, escape_html(&record.display_name())));
            lines.push(format!(
                "   💰 {currency}{}  (target {currency}{})",
                format_amount(current, 2),
                format_amount(record.target_price, 0)
            ));
            lines.push(format!("   📉 You save {currency}{}", format_amount(alert.drop_amount, 2)));
            lines.push(format!(
                "   🔗 <a href=\"{}\">Buy Now →</a>",
                escape_html(&record.url)
            ));
            lines.push(String::new());
        }

        lines.push(format!(
            "— <i>Price Drop Watcher ({})</i>",
            self.generated_at.format("%H:%M %d %b %Y")
        ));
        lines.join("\n")
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
