use chrono::FixedOffset;
use std::sync::Arc;

use crate::config::AlertsConfig;
use crate::models::{escape_html, InboundCommand, InboundMessage, NewWatch, ProductRecord, RecordStatus};
use crate::plugins::{ChatTransport, RetailerRegistry};
use crate::price::{format_amount, parse_target};
use crate::store::ProductStore;
use crate::utils::error::{AppError, ValidationError};

const HISTORY_LIMIT: usize = 10;
const ADD_USAGE: &str = "Usage: <code>/add &lt;url&gt; &lt;target price&gt;</code>";
const EDIT_USAGE: &str = "Usage: <code>/edit &lt;number&gt; &lt;new target price&gt;</code>";

/// One `/add` that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub record: ProductRecord,
    pub was_new: bool,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub registrations: Vec<Registration>,
    /// Commands read this cycle, valid or not.
    pub processed: usize,
    pub rejected: Vec<(i64, ValidationError)>,
    /// Commands that validated but could not be written.
    pub store_failures: usize,
    pub offset: i64,
}

/// Reads chat commands past the stored offset, applies them to the
/// watchlist and answers the sender.
pub struct CommandIngestor {
    store: ProductStore,
    transport: Arc<dyn ChatTransport>,
    registry: RetailerRegistry,
    currency: String,
    local_offset: FixedOffset,
}

enum Handled {
    Registered(Registration),
    Done,
}

impl CommandIngestor {
    pub fn new(
        store: ProductStore,
        transport: Arc<dyn ChatTransport>,
        registry: RetailerRegistry,
        alerts: &AlertsConfig,
    ) -> Self {
        Self {
            store,
            transport,
            registry,
            currency: alerts.currency_symbol.clone(),
            local_offset: alerts.local_offset(),
        }
    }

    /// Processes every pending command exactly once at most: the offset is
    /// advanced past the whole batch before any command is applied.
    pub async fn ingest(&self) -> Result<IngestOutcome, AppError> {
        let offset = self.store.command_offset().await?;
        let messages = self.transport.fetch_updates(offset).await?;

        let mut outcome = IngestOutcome {
            offset,
            ..Default::default()
        };
        if messages.is_empty() {
            tracing::info!("No new chat commands");
            return Ok(outcome);
        }

        let new_offset = messages.iter().map(|m| m.update_id).fold(offset, i64::max);
        self.store.set_command_offset(new_offset).await?;
        outcome.offset = new_offset;
        tracing::info!("Read {} chat update(s), offset {} -> {}", messages.len(), offset, new_offset);

        for message in messages.iter().filter(|m| m.update_id > offset) {
            outcome.processed += 1;
            let command = InboundCommand::parse(&message.text);
            let kind = command.kind();
            tracing::debug!("Update {} parsed as {}", message.update_id, kind);

            match self.handle(message, command).await {
                Ok(Handled::Registered(registration)) => outcome.registrations.push(registration),
                Ok(Handled::Done) => {}
                Err(AppError::Validation(err)) => {
                    tracing::warn!("Rejected update {}: {}", message.update_id, err);
                    self.reply(&message.chat_id, &rejection_text(kind, &err)).await;
                    outcome.rejected.push((message.update_id, err));
                }
                Err(err) => {
                    tracing::error!("Failed to apply update {}: {}", message.update_id, err);
                    outcome.store_failures += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn handle(&self, message: &InboundMessage, command: InboundCommand) -> Result<Handled, AppError> {
        match command {
            InboundCommand::Add { url, target_price } => {
                let watch = self.validate_add(url, target_price).await?;
                let (record, was_new) = self.store.upsert(watch).await?;
                let text = if was_new {
                    tracing::info!("Now tracking {} (target {})", record.url, record.target_price);
                    format!(
                        "✅ Now tracking <b>{}</b>\n   🎯 Target: {}{}\n   Prices are checked every cycle. Use /list to see your watchlist.",
                        escape_html(&record.display_name()),
                        self.currency,
                        format_amount(record.target_price, 0)
                    )
                } else {
                    tracing::info!("Updated target of {} to {}", record.url, record.target_price);
                    format!(
                        "✏️ Target for <b>{}</b> updated to {}{}",
                        escape_html(&record.display_name()),
                        self.currency,
                        format_amount(record.target_price, 0)
                    )
                };
                self.reply(&message.chat_id, &text).await;
                Ok(Handled::Registered(Registration { record, was_new }))
            }
            InboundCommand::List => {
                let records = self.store.list().await?;
                self.reply(&message.chat_id, &self.watchlist_text(&records)).await;
                Ok(Handled::Done)
            }
            InboundCommand::Edit { index, target_price } => {
                let target = target_price.ok_or(ValidationError::MissingArgument("target price"))?;
                let target_price = parse_target(&target).ok_or(ValidationError::InvalidTargetPrice(target))?;
                let record = self.select(index).await?;
                self.store.set_target(&record.url, target_price).await?;

                tracing::info!("Edited target of {} to {}", record.url, target_price);
                let text = format!(
                    "✏️ Updated target for <b>{}</b> to {}{}",
                    escape_html(&record.display_name()),
                    self.currency,
                    format_amount(target_price, 0)
                );
                self.reply(&message.chat_id, &text).await;
                Ok(Handled::Done)
            }
            InboundCommand::Help => {
                self.reply(&message.chat_id, HELP_TEXT).await;
                Ok(Handled::Done)
            }
            InboundCommand::Status => {
                let records = self.store.list().await?;
                let paused = records.iter().filter(|r| r.is_paused()).count();
                let retailers = self.registry.list_retailer_types().await.join(", ");
                let text = format!(
                    "📊 <b>Status</b>\n\nProducts tracked: <b>{}</b> (🟢 {} active, ⏸️ {} paused)\nRetailers: {}",
                    records.len(),
                    records.len() - paused,
                    paused,
                    retailers
                );
                self.reply(&message.chat_id, &text).await;
                Ok(Handled::Done)
            }
            InboundCommand::Pause { index } => {
                self.toggle(message, index, RecordStatus::Paused).await?;
                Ok(Handled::Done)
            }
            InboundCommand::Resume { index } => {
                self.toggle(message, index, RecordStatus::Active).await?;
                Ok(Handled::Done)
            }
            InboundCommand::History { index } => {
                let record = self.select(index).await?;
                let entries = self.store.history(&record.url, HISTORY_LIMIT).await?;
                let name = escape_html(&record.display_name());
                let text = if entries.is_empty() {
                    format!("📜 No history yet for <b>{}</b>.\nHistory is recorded on every price check.", name)
                } else {
                    let mut lines = vec![format!("📜 <b>Price History: {}</b>\n", name)];
                    for entry in &entries {
                        lines.push(format!(
                            "  {} — {}{}",
                            entry.recorded_at.with_timezone(&self.local_offset).format("%d %b %H:%M"),
                            self.currency,
                            format_amount(entry.price, 2)
                        ));
                    }
                    lines.join("\n")
                };
                self.reply(&message.chat_id, &text).await;
                Ok(Handled::Done)
            }
            InboundCommand::Unknown => Ok(Handled::Done),
        }
    }

    async fn validate_add(&self, url: Option<String>, target: Option<String>) -> Result<NewWatch, ValidationError> {
        let url = url.ok_or(ValidationError::MissingArgument("url"))?;
        let target = target.ok_or(ValidationError::MissingArgument("target price"))?;
        let target_price = parse_target(&target).ok_or(ValidationError::InvalidTargetPrice(target))?;

        let watch = NewWatch::new(url, target_price)?;
        if !self.registry.supports(&watch.url).await {
            let host = url::Url::parse(&watch.url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| watch.url.clone());
            return Err(ValidationError::UnsupportedRetailer(host));
        }
        Ok(watch)
    }

    /// Resolves a 1-based `/list` position.
    async fn select(&self, index: Option<String>) -> Result<ProductRecord, AppError> {
        let index: usize = index
            .and_then(|i| i.trim_start_matches('#').parse().ok())
            .ok_or(ValidationError::MissingArgument("product number"))?;
        let mut records = self.store.list().await?;
        let len = records.len();
        if index == 0 || index > len {
            return Err(ValidationError::IndexOutOfRange { index, len }.into());
        }
        Ok(records.swap_remove(index - 1))
    }

    async fn toggle(&self, message: &InboundMessage, index: Option<String>, status: RecordStatus) -> Result<(), AppError> {
        let position = index.clone().unwrap_or_default();
        let record = self.select(index).await?;
        self.store.set_status(&record.url, status).await?;

        let name = escape_html(&record.display_name());
        let text = match status {
            RecordStatus::Paused => format!(
                "⏸️ Paused tracking for <b>{}</b>.\nUse <code>/resume {}</code> to resume.",
                name, position
            ),
            RecordStatus::Active => format!("▶️ Resumed tracking for <b>{}</b>.", name),
        };
        tracing::info!("Set {} to {}", record.url, status);
        self.reply(&message.chat_id, &text).await;
        Ok(())
    }

    fn watchlist_text(&self, records: &[ProductRecord]) -> String {
        if records.is_empty() {
            return format!("📋 Your watchlist is empty.\n{}", ADD_USAGE);
        }

        let mut lines = vec!["📋 <b>Your Watchlist</b>\n".to_string()];
        for (i, record) in records.iter().enumerate() {
            let icon = if record.is_paused() { "⏸️" } else { "🟢" };
            let last = record
                .current_price
                .map(|p| format!("{}{}", self.currency, format_amount(p, 2)))
                .unwrap_or_else(|| "N/A".to_string());
            lines.push(format!(
                "{} {}. <b>{}</b>\n   Target: {}{} | Last: {}",
                icon,
                i + 1,
                escape_html(&record.display_name()),
                self.currency,
                format_amount(record.target_price, 0),
                last
            ));
        }
        lines.join("\n")
    }

    /// Replies are best effort; a lost reply never fails the command.
    async fn reply(&self, chat_id: &str, text: &str) {
        if chat_id.is_empty() {
            return;
        }
        if let Err(e) = self.transport.send_message(chat_id, text).await {
            tracing::warn!("Failed to reply to chat {}: {}", chat_id, e);
        }
    }
}

fn rejection_text(kind: &str, err: &ValidationError) -> String {
    match (kind, err) {
        (_, ValidationError::UnsupportedRetailer(host)) => format!(
            "⚠️ {} is not supported yet. I can track Amazon and Flipkart product pages.",
            escape_html(host)
        ),
        (_, ValidationError::IndexOutOfRange { len, .. }) => {
            format!("⚠️ Invalid number. You have {} product(s). Use /list to see them.", len)
        }
        ("edit", other) => format!("⚠️ {}\n{}", escape_html(&other.to_string()), EDIT_USAGE),
        (_, ValidationError::MissingArgument("product number")) => {
            "⚠️ Which product? Send its number from /list, e.g. <code>/pause 1</code>.".to_string()
        }
        (_, other) => format!("⚠️ {}\n{}", escape_html(&other.to_string()), ADD_USAGE),
    }
}

const HELP_TEXT: &str = "❓ <b>Available Commands</b>\n\n\
<b>Add products:</b>\n\
• <code>/add URL 2000</code> — track an Amazon/Flipkart page with a ₹2,000 target\n\
• Re-adding the same URL updates its target\n\n\
<b>Manage:</b>\n\
• /list — view your watchlist\n\
• /edit 2 1500 — change the target for #2 to ₹1,500\n\
• /pause 2 — pause tracking for #2\n\
• /resume 2 — resume tracking for #2\n\
• /history 1 — price history for #1\n\
• /status — quick summary\n\n\
Alerts are sent once per check when a price is at or below its target.";
