use serde::{Deserialize, Serialize};

/// A raw chat message as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    /// Monotonic transport sequence number; the ingest offset is built on it.
    pub update_id: i64,
    pub chat_id: String,
    pub text: String,
}

/// Parsed form of an inbound message. Arguments stay raw so validation can
/// report exactly what was wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    Add {
        url: Option<String>,
        target_price: Option<String>,
    },
    List,
    /// Changes the target of the record at a `/list` position.
    Edit {
        index: Option<String>,
        target_price: Option<String>,
    },
    Help,
    Status,
    Pause { index: Option<String> },
    Resume { index: Option<String> },
    History { index: Option<String> },
    Unknown,
}

impl InboundCommand {
    pub fn parse(text: &str) -> Self {
        let mut tokens = text.split_whitespace();
        let Some(head) = tokens.next() else {
            return InboundCommand::Unknown;
        };
        if !head.starts_with('/') {
            return InboundCommand::Unknown;
        }

        // "/list@SomeBot" is how group chats address a specific bot.
        let word = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
        let mut arg = || tokens.next().map(str::to_string);

        match word.as_str() {
            "/add" => {
                let url = arg();
                let target_price = arg();
                InboundCommand::Add { url, target_price }
            }
            "/list" => InboundCommand::List,
            "/edit" => {
                let index = arg();
                let target_price = arg();
                InboundCommand::Edit { index, target_price }
            }
            "/start" | "/help" => InboundCommand::Help,
            "/status" => InboundCommand::Status,
            "/pause" => InboundCommand::Pause { index: arg() },
            "/resume" => InboundCommand::Resume { index: arg() },
            "/history" => InboundCommand::History { index: arg() },
            _ => InboundCommand::Unknown,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundCommand::Add { .. } => "add",
            InboundCommand::List => "list",
            InboundCommand::Edit { .. } => "edit",
            InboundCommand::Help => "help",
            InboundCommand::Status => "status",
            InboundCommand::Pause { .. } => "pause",
            InboundCommand::Resume { .. } => "resume",
            InboundCommand::History { .. } => "history",
            InboundCommand::Unknown => "unknown",
        }
    }
}
