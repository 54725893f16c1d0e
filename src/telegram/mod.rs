use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MaybeInaccessibleMessage, Message,
    MessageId, ParseMode as TelegramParseMode, Update, UpdateKind, WebhookInfo,
};
use teloxide::utils::command::parse_command;
use teloxide::RequestError;

use crate::error::{HabitTrackerError, Result};
use crate::interfaces::gateway::{
    ChatId as GatewayChatId, ChoiceButton, InboundEvent, MessagingGateway, ParseMode,
    SendOptions, SentMessage,
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

fn api_error(method: &str, err: RequestError) -> HabitTrackerError {
    HabitTrackerError::Http(format!("{method}: {err}"))
}

fn parse_url(raw: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(raw).map_err(|e| HabitTrackerError::Config(format!("invalid url '{raw}': {e}")))
}

/// Telegram side of the bot, backed by a teloxide [`Bot`].
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(HabitTrackerError::Config(
                "telegram bot token is empty".to_string(),
            ));
        }
        let bot = Bot::new(token.trim()).set_api_url(parse_url(api_url)?);
        Ok(Self { bot })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Username used to recognise `/cmd@name` addressed to this bot.
    pub async fn username(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| api_error("getMe", e))?;
        Ok(me.user.username.clone().unwrap_or_default())
    }

    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        self.bot
            .set_webhook(parse_url(url)?)
            .await
            .map_err(|e| api_error("setWebhook", e))?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        self.bot
            .delete_webhook()
            .await
            .map_err(|e| api_error("deleteWebhook", e))?;
        Ok(())
    }

    pub async fn webhook_info(&self) -> Result<WebhookInfo> {
        self.bot
            .get_webhook_info()
            .await
            .map_err(|e| api_error("getWebhookInfo", e))
    }
}

fn message_id(raw: i64) -> Result<MessageId> {
    i32::try_from(raw)
        .map(MessageId)
        .map_err(|_| HabitTrackerError::Validation(format!("message id {raw} out of range")))
}

fn sent(message: &Message) -> SentMessage {
    SentMessage {
        chat_id: message.chat.id.0,
        message_id: i64::from(message.id.0),
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(
        &self,
        chat_id: GatewayChatId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(mode) = options.parse_mode {
            request = request.parse_mode(telegram_parse_mode(mode));
        }
        let message = request.await.map_err(|e| api_error("sendMessage", e))?;
        Ok(sent(&message))
    }

    async fn send_choice_prompt(
        &self,
        chat_id: GatewayChatId,
        text: &str,
        buttons: [ChoiceButton; 2],
    ) -> Result<SentMessage> {
        let row: Vec<InlineKeyboardButton> = buttons
            .into_iter()
            .map(|button| InlineKeyboardButton::callback(button.label, button.token))
            .collect();
        let message = self
            .bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(InlineKeyboardMarkup::new(vec![row]))
            .await
            .map_err(|e| api_error("sendMessage", e))?;
        Ok(sent(&message))
    }

    async fn acknowledge_interaction(&self, interaction_id: &str, text: &str) -> Result<()> {
        self.bot
            .answer_callback_query(interaction_id.to_string())
            .text(text)
            .await
            .map_err(|e| api_error("answerCallbackQuery", e))?;
        Ok(())
    }

    async fn edit_message(&self, chat_id: GatewayChatId, message_id_raw: i64, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(ChatId(chat_id), message_id(message_id_raw)?, text)
            .await
            .map_err(|e| api_error("editMessageText", e))?;
        Ok(())
    }
}

#[allow(deprecated)]
fn telegram_parse_mode(mode: ParseMode) -> TelegramParseMode {
    match mode {
        ParseMode::Markdown => TelegramParseMode::Markdown,
        ParseMode::Html => TelegramParseMode::Html,
    }
}

/// Maps a Telegram update onto the bot's transport-neutral event. Commands
/// addressed to a different bot (`/help@other_bot`) come back as plain text.
pub fn inbound_event(update: &Update, bot_username: &str) -> Option<InboundEvent> {
    match &update.kind {
        UpdateKind::Message(message) => {
            let chat_id = message.chat.id.0;
            let command = message
                .text()
                .and_then(|text| parse_command(text, bot_username))
                .filter(|(command, _)| !command.is_empty());
            Some(match command {
                Some((command, args)) => InboundEvent::Command {
                    command: command.to_lowercase(),
                    args: args.join(" "),
                    chat_id,
                },
                None => InboundEvent::Text { chat_id },
            })
        }
        UpdateKind::CallbackQuery(query) => match &query.message {
            Some(MaybeInaccessibleMessage::Regular(message)) => Some(InboundEvent::Interaction {
                token: query.data.clone().unwrap_or_default(),
                chat_id: message.chat.id.0,
                message_id: i64::from(message.id.0),
                interaction_id: query.id.to_string(),
            }),
            _ => {
                tracing::debug!("ignoring callback without an accessible message");
                None
            }
        },
        _ => None,
    }
}
