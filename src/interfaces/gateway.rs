use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub type ChatId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Markdown,
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,
}

impl SendOptions {
    pub fn markdown() -> Self {
        Self {
            parse_mode: Some(ParseMode::Markdown),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceButton {
    pub label: String,
    pub token: String,
}

impl ChoiceButton {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        command: String,
        args: String,
        chat_id: ChatId,
    },
    Interaction {
        token: String,
        chat_id: ChatId,
        message_id: i64,
        interaction_id: String,
    },
    Text {
        chat_id: ChatId,
    },
}

impl InboundEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            InboundEvent::Command { chat_id, .. }
            | InboundEvent::Interaction { chat_id, .. }
            | InboundEvent::Text { chat_id } => *chat_id,
        }
    }
}

#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage>;

    async fn send_choice_prompt(
        &self,
        chat_id: ChatId,
        text: &str,
        buttons: [ChoiceButton; 2],
    ) -> Result<SentMessage>;

    async fn acknowledge_interaction(&self, interaction_id: &str, text: &str) -> Result<()>;

    async fn edit_message(&self, chat_id: ChatId, message_id: i64, text: &str) -> Result<()>;
}
