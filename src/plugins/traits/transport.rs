use async_trait::async_trait;

use crate::models::InboundMessage;
use crate::utils::error::DeliveryError;

/// Two-way chat channel: pending commands in, replies and alerts out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Messages with an update id strictly greater than `last_update_id`.
    async fn fetch_updates(&self, last_update_id: i64) -> Result<Vec<InboundMessage>, DeliveryError>;

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError>;
}
