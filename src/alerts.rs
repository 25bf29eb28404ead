use chrono::{DateTime, FixedOffset};

use crate::models::{AlertEvent, AlertPolicy, NotificationPayload, ProductRecord};
use crate::refresh::RefreshOutcome;

/// Turns one cycle's refresh results into at most one notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertComposer {
    policy: AlertPolicy,
}

impl AlertComposer {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Only records refreshed this cycle can qualify.
    pub fn compose(&self, outcomes: &[RefreshOutcome], now: DateTime<FixedOffset>) -> Option<NotificationPayload> {
        let alerts: Vec<AlertEvent> = outcomes
            .iter()
            .filter(|o| o.updated)
            .filter_map(|o| self.qualify(&o.record))
            .collect();

        if alerts.is_empty() {
            tracing::debug!("No products at or below target");
            return None;
        }

        Some(NotificationPayload {
            alerts,
            generated_at: now,
        })
    }

    fn qualify(&self, record: &ProductRecord) -> Option<AlertEvent> {
        let current = record.current_price?;
        if current > record.target_price {
            return None;
        }
        if self.policy == AlertPolicy::OnChange && record.last_alerted == Some(current) {
            tracing::debug!("{} already alerted at {}", record.url, current);
            return None;
        }
        Some(AlertEvent {
            record: record.clone(),
            drop_amount: record.target_price - current,
        })
    }

    /// Refreshed records back above target whose alert marker should be
    /// cleared so a later drop alerts again.
    pub fn rearmed<'a>(&self, outcomes: &'a [RefreshOutcome]) -> Vec<&'a ProductRecord> {
        outcomes
            .iter()
            .filter(|o| o.updated && !o.record.is_below_target() && o.record.last_alerted.is_some())
            .map(|o| &o.record)
            .collect()
    }
}
