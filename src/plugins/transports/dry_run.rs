use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::InboundMessage;
use crate::plugins::traits::ChatTransport;
use crate::utils::error::DeliveryError;

/// Reads through to an inner transport (if any) but never sends. Outgoing
/// messages are logged and kept for inspection.
#[derive(Default)]
pub struct DryRunTransport {
    inner: Option<Arc<dyn ChatTransport>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrapping(inner: Arc<dyn ChatTransport>) -> Self {
        Self {
            inner: Some(inner),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for DryRunTransport {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn fetch_updates(&self, last_update_id: i64) -> Result<Vec<InboundMessage>, DeliveryError> {
        match &self.inner {
            Some(inner) => inner.fetch_updates(last_update_id).await,
            None => Ok(Vec::new()),
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        tracing::info!("[dry-run] would send to {}:\n{}", chat_id, text);
        self.sent.lock().await.push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}
