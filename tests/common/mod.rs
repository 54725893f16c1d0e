#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;
use tokio::sync::Mutex;

use habit_tracker::bot::{BotSettings, HabitBot};
use habit_tracker::error::Result;
use habit_tracker::habits::HabitStore;
use habit_tracker::identity::{ChatIdentity, CHAT_FILE};
use habit_tracker::interfaces::gateway::{
    ChatId, ChoiceButton, MessagingGateway, SendOptions, SentMessage,
};
use habit_tracker::scheduler::parse_timezone;

pub const CHAT: ChatId = 4242;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Text {
        chat_id: ChatId,
        text: String,
    },
    Prompt {
        chat_id: ChatId,
        text: String,
        tokens: Vec<String>,
    },
    Ack {
        interaction_id: String,
        text: String,
    },
    Edit {
        chat_id: ChatId,
        message_id: i64,
        text: String,
    },
}

pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    next_message_id: AtomicI64,
    send_delay: Duration,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1),
            send_delay: Duration::ZERO,
        }
    }

    /// Every outgoing text waits `delay` before it is recorded.
    pub fn with_send_delay(delay: Duration) -> Self {
        Self {
            send_delay: delay,
            ..Self::new()
        }
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().await.clone()
    }

    pub async fn take(&self) -> Vec<GatewayCall> {
        std::mem::take(&mut *self.calls.lock().await)
    }

    pub async fn prompt_tokens(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Prompt { tokens, .. } => Some(tokens.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn sent(&self, chat_id: ChatId) -> SentMessage {
        SentMessage {
            chat_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        _options: SendOptions,
    ) -> Result<SentMessage> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.calls.lock().await.push(GatewayCall::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(self.sent(chat_id))
    }

    async fn send_choice_prompt(
        &self,
        chat_id: ChatId,
        text: &str,
        buttons: [ChoiceButton; 2],
    ) -> Result<SentMessage> {
        self.calls.lock().await.push(GatewayCall::Prompt {
            chat_id,
            text: text.to_string(),
            tokens: buttons.iter().map(|b| b.token.clone()).collect(),
        });
        Ok(self.sent(chat_id))
    }

    async fn acknowledge_interaction(&self, interaction_id: &str, text: &str) -> Result<()> {
        self.calls.lock().await.push(GatewayCall::Ack {
            interaction_id: interaction_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_message(&self, chat_id: ChatId, message_id: i64, text: &str) -> Result<()> {
        self.calls.lock().await.push(GatewayCall::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<HabitStore>,
    pub gateway: Arc<RecordingGateway>,
    pub bot: Arc<HabitBot>,
}

pub fn settings() -> BotSettings {
    BotSettings {
        morning_time: "08:00".parse().unwrap(),
        evening_time: "21:00".parse().unwrap(),
        timezone: parse_timezone("America/Argentina/Buenos_Aires").unwrap(),
    }
}

pub fn harness(configured_chat: Option<ChatId>) -> Harness {
    harness_with(configured_chat, RecordingGateway::new())
}

pub fn harness_with(configured_chat: Option<ChatId>, gateway: RecordingGateway) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(HabitStore::open(dir.path()).unwrap());
    let identity =
        Arc::new(ChatIdentity::load(dir.path().join(CHAT_FILE), configured_chat).unwrap());
    let gateway = Arc::new(gateway);
    let bot = Arc::new(HabitBot::new(
        store.clone(),
        gateway.clone(),
        identity,
        settings(),
    ));
    Harness {
        dir,
        store,
        gateway,
        bot,
    }
}

pub fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}
