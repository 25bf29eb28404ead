use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::TelegramConfig;
use crate::models::InboundMessage;
use crate::plugins::traits::ChatTransport;
use crate::utils::error::{AppError, DeliveryError};

/// Telegram rejects longer messages outright.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: serde_json::Value,
}

impl Update {
    /// Non-text updates still carry an id and must advance the offset, so
    /// they come through with empty text.
    fn into_inbound(self) -> InboundMessage {
        let (chat_id, text) = match self.message {
            Some(message) => {
                let chat_id = match message.chat.id {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (chat_id, message.text.unwrap_or_default())
            }
            None => (String::new(), String::new()),
        };
        InboundMessage {
            update_id: self.update_id,
            chat_id,
            text,
        }
    }
}

/// Bot API client over long-polling `getUpdates` and `sendMessage`.
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    bot_token: String,
    poll_timeout: u64,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout + 10))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            poll_timeout: config.poll_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn send_chunk(&self, chat_id: &str, chunk: &Chunk) -> Result<(), DeliveryError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": chunk.text,
            "disable_web_page_preview": true,
        });
        if chunk.html {
            payload["parse_mode"] = json!("HTML");
        }

        let response: ApiResponse<serde_json::Value> = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(DeliveryError::Api {
                description: response.description.unwrap_or_else(|| "sendMessage failed".to_string()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn fetch_updates(&self, last_update_id: i64) -> Result<Vec<InboundMessage>, DeliveryError> {
        let offset = (last_update_id + 1).to_string();
        let timeout = self.poll_timeout.to_string();

        let response: ApiResponse<Vec<Update>> = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset.as_str()), ("timeout", timeout.as_str())])
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(DeliveryError::Api {
                description: response.description.unwrap_or_else(|| "getUpdates failed".to_string()),
            });
        }

        let mut messages: Vec<InboundMessage> = response
            .result
            .unwrap_or_default()
            .into_iter()
            .map(Update::into_inbound)
            .collect();
        messages.sort_by_key(|m| m.update_id);
        Ok(messages)
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), DeliveryError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.send_chunk(chat_id, &chunk).await?;
        }
        tracing::debug!("Sent message to chat {}", chat_id);
        Ok(())
    }
}

/// One `sendMessage` worth of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Plain chunks are sent without a parse mode.
    pub html: bool,
}

impl Chunk {
    fn html(text: String) -> Self {
        Self { text, html: true }
    }
}

/// Splits on line boundaries so HTML tags opened on a line stay balanced.
/// A single line longer than `limit` cannot be cut safely inside markup, so
/// it is reduced to its visible text and sent as plain chunks.
pub fn split_message(text: &str, limit: usize) -> Vec<Chunk> {
    if text.chars().count() <= limit {
        return vec![Chunk::html(text.to_string())];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        if line_len > limit {
            if !current.is_empty() {
                chunks.push(Chunk::html(std::mem::take(&mut current)));
                current_len = 0;
            }
            let visible: Vec<char> = visible_text(line).chars().collect();
            chunks.extend(visible.chunks(limit).map(|piece| Chunk {
                text: piece.iter().collect(),
                html: false,
            }));
            continue;
        }

        let needed = if current.is_empty() { line_len } else { line_len + 1 };
        if current_len + needed > limit {
            chunks.push(Chunk::html(std::mem::take(&mut current)));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current_len += line_len;
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(Chunk::html(current));
    }
    chunks
}

/// Text content of an HTML fragment with entities decoded.
fn visible_text(fragment: &str) -> String {
    Html::parse_fragment(fragment).root_element().text().collect()
}
