use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::{HabitTrackerError, Result};
use crate::habits::{DailyLog, Habit, HabitStore};
use crate::identity::ChatIdentity;
use crate::interfaces::gateway::{
    ChatId, ChoiceButton, InboundEvent, MessagingGateway, SendOptions,
};
use crate::scheduler::DailyTime;

pub mod token;
use token::{Choice, InteractionToken, Phase};

#[derive(Debug, Clone, Copy)]
pub struct BotSettings {
    pub morning_time: DailyTime,
    pub evening_time: DailyTime,
    pub timezone: Tz,
}

/// Turns inbound chat events into store updates and renders the daily
/// plan/review prompts.
pub struct HabitBot {
    store: Arc<HabitStore>,
    gateway: Arc<dyn MessagingGateway>,
    identity: Arc<ChatIdentity>,
    settings: BotSettings,
}

impl HabitBot {
    pub fn new(
        store: Arc<HabitStore>,
        gateway: Arc<dyn MessagingGateway>,
        identity: Arc<ChatIdentity>,
        settings: BotSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            identity,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<HabitStore> {
        &self.store
    }

    pub fn identity(&self) -> &Arc<ChatIdentity> {
        &self.identity
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.settings.timezone).date_naive()
    }

    pub async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        if !matches!(event, InboundEvent::Interaction { .. }) {
            if let Err(err) = self.identity.register(event.chat_id()) {
                tracing::error!("failed to register chat {}: {err}", event.chat_id());
            }
        }

        match event {
            InboundEvent::Command {
                command,
                args,
                chat_id,
            } => self.handle_command(chat_id, &command, &args).await,
            InboundEvent::Interaction {
                token,
                chat_id,
                message_id,
                interaction_id,
            } => self
                .handle_interaction(&token, chat_id, message_id, &interaction_id, self.today())
                .await
                .map(|_| ()),
            InboundEvent::Text { .. } => Ok(()),
        }
    }

    pub async fn handle_command(&self, chat_id: ChatId, command: &str, args: &str) -> Result<()> {
        tracing::debug!(chat_id, command, "handling command");
        match command {
            "start" => self.reply(chat_id, &self.welcome_text()).await,
            "help" => {
                self.gateway
                    .send_text(chat_id, HELP_TEXT, SendOptions::markdown())
                    .await?;
                Ok(())
            }
            "addhabit" => self.add_habit(chat_id, args).await,
            "listhabits" => self.list_habits(chat_id).await,
            "deletehabit" => self.delete_habit(chat_id, args).await,
            _ => {
                self.reply(
                    chat_id,
                    "Unknown command. Use /help to see the available commands.",
                )
                .await
            }
        }
    }

    /// Applies a button press for `date`. Tokens that do not decode (stale or
    /// foreign buttons) are dropped without telling the user; the return value
    /// is `None` in that case.
    pub async fn handle_interaction(
        &self,
        raw_token: &str,
        chat_id: ChatId,
        message_id: i64,
        interaction_id: &str,
        date: NaiveDate,
    ) -> Result<Option<InteractionToken>> {
        let token = match InteractionToken::decode(raw_token) {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!(token = raw_token, "discarding interaction: {err}");
                return Ok(None);
            }
        };

        let name = self
            .store
            .habit(token.habit_id)
            .map(|habit| habit.name)
            .unwrap_or_else(|| format!("habit #{}", token.habit_id));

        let recorded = match token.phase {
            Phase::Plan => self
                .store
                .record_plan(token.habit_id, token.choice.is_yes(), date),
            Phase::Review => {
                self.store
                    .record_completion(token.habit_id, token.choice.is_yes(), date)
            }
        };
        if let Err(err) = recorded {
            tracing::error!(token = raw_token, "failed to record answer: {err}");
            self.gateway
                .acknowledge_interaction(interaction_id, "Could not save your answer, try again.")
                .await?;
            return Err(err);
        }

        let confirmation = confirmation_text(&token, &name);
        self.gateway
            .acknowledge_interaction(interaction_id, &confirmation)
            .await?;
        self.gateway
            .edit_message(chat_id, message_id, &confirmation)
            .await?;
        Ok(Some(token))
    }

    pub async fn send_morning_plan(&self) -> Result<()> {
        let Some(chat_id) = self.identity.chat_id() else {
            tracing::info!("no user chat registered yet, skipping morning plan");
            return Ok(());
        };

        let habits = self.store.list_habits();
        if habits.is_empty() {
            return self
                .reply(
                    chat_id,
                    "You have no habits configured. Use /addhabit to add one.",
                )
                .await;
        }

        self.reply(
            chat_id,
            "🌅 Good morning! Let's plan your day.\nWhich habits will you do today?",
        )
        .await?;

        for habit in &habits {
            let buttons = [
                ChoiceButton::new(
                    "👍 I'll do it",
                    InteractionToken::new(Phase::Plan, Choice::Yes, habit.id).encode(),
                ),
                ChoiceButton::new(
                    "⏭️ Not today",
                    InteractionToken::new(Phase::Plan, Choice::No, habit.id).encode(),
                ),
            ];
            let text = format!("🎯 {}", habit.name);
            if let Err(err) = self.gateway.send_choice_prompt(chat_id, &text, buttons).await {
                tracing::error!(habit_id = habit.id, "failed to send plan prompt: {err}");
            }
        }
        Ok(())
    }

    pub async fn send_evening_review(&self) -> Result<()> {
        self.send_evening_review_on(self.today()).await.map(|_| ())
    }

    /// Sends review prompts for `date` and returns the habits that were asked
    /// about.
    pub async fn send_evening_review_on(&self, date: NaiveDate) -> Result<Vec<Habit>> {
        let Some(chat_id) = self.identity.chat_id() else {
            tracing::info!("no user chat registered yet, skipping evening review");
            return Ok(Vec::new());
        };

        let candidates = review_candidates(&self.store.list_habits(), &self.store.daily_logs(date));
        if candidates.is_empty() {
            self.reply(
                chat_id,
                "🌙 Good evening! You didn't plan any habits today. Tomorrow is another day!",
            )
            .await?;
            return Ok(candidates);
        }

        self.reply(
            chat_id,
            "🌙 Good evening! Time to review today's progress.",
        )
        .await?;

        for habit in &candidates {
            let buttons = [
                ChoiceButton::new(
                    "✅ Yes",
                    InteractionToken::new(Phase::Review, Choice::Yes, habit.id).encode(),
                ),
                ChoiceButton::new(
                    "❌ No",
                    InteractionToken::new(Phase::Review, Choice::No, habit.id).encode(),
                ),
            ];
            let text = format!("❓ {}\nDid you complete it?", habit.name);
            if let Err(err) = self.gateway.send_choice_prompt(chat_id, &text, buttons).await {
                tracing::error!(habit_id = habit.id, "failed to send review prompt: {err}");
            }
        }
        Ok(candidates)
    }

    async fn add_habit(&self, chat_id: ChatId, args: &str) -> Result<()> {
        if args.trim().is_empty() {
            return self
                .reply(
                    chat_id,
                    "Please provide a habit name.\nExample: /addhabit Exercise",
                )
                .await;
        }
        let (name, description) = args.split_once('|').unwrap_or((args, ""));

        match self.store.add_habit(name, description) {
            Ok(habit) => {
                let text = format!(
                    "✅ Habit added!\n\nID: {}\nName: {}",
                    habit.id, habit.name
                );
                self.reply(chat_id, &text).await
            }
            Err(err @ HabitTrackerError::Validation(_)) => {
                self.reply(chat_id, &format!("Could not add habit: {err}"))
                    .await
            }
            Err(err) => {
                self.reply(chat_id, "Could not save the habit, try again later.")
                    .await?;
                Err(err)
            }
        }
    }

    async fn list_habits(&self, chat_id: ChatId) -> Result<()> {
        let habits = self.store.list_habits();
        if habits.is_empty() {
            return self
                .reply(
                    chat_id,
                    "You have no habits yet.\nUse /addhabit to add one.",
                )
                .await;
        }

        let mut text = String::from("📋 Your habits:\n\n");
        for habit in &habits {
            text.push_str(&format!("ID {}: {}", habit.id, habit.name));
            if let Some(description) = &habit.description {
                text.push_str(&format!(" ({description})"));
            }
            text.push('\n');
        }
        self.reply(chat_id, &text).await
    }

    async fn delete_habit(&self, chat_id: ChatId, args: &str) -> Result<()> {
        let args = args.trim();
        if args.is_empty() {
            return self
                .reply(
                    chat_id,
                    "Please provide the ID of the habit to delete.\nExample: /deletehabit 1",
                )
                .await;
        }
        let Ok(id) = args.parse::<i64>() else {
            return self
                .reply(chat_id, "Invalid ID. It must be a number.")
                .await;
        };

        match self.store.delete_habit(id) {
            Ok(()) => self.reply(chat_id, "✅ Habit deleted!").await,
            Err(HabitTrackerError::NotFound(id)) => {
                self.reply(chat_id, &format!("Habit {id} not found."))
                    .await
            }
            Err(err) => {
                self.reply(chat_id, "Could not delete the habit, try again later.")
                    .await?;
                Err(err)
            }
        }
    }

    fn welcome_text(&self) -> String {
        format!(
            "Welcome to Habit Tracker Bot! 🎯\n\n\
             I'll help you keep track of your daily habits.\n\n\
             📅 Daily routine:\n\
             🌅 {} - plan your day\n\
             🌙 {} - review your progress\n\n\
             Use /help to see all commands.",
            self.settings.morning_time, self.settings.evening_time
        )
    }

    async fn reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.gateway
            .send_text(chat_id, text, SendOptions::default())
            .await?;
        Ok(())
    }
}

const HELP_TEXT: &str = "📋 *Available commands:*\n\n\
/start - Start the bot\n\
/help - Show this help\n\
/addhabit <name> - Add a new habit\n\
/listhabits - List your habits\n\
/deletehabit <id> - Delete a habit\n\n\
💡 *Example:*\n\
`/addhabit Exercise | 30 minutes`";

/// Habits to ask about in the evening: anything planned for `logs`' day or
/// never answered in the morning. Habits explicitly skipped are left out.
pub fn review_candidates(habits: &[Habit], logs: &[DailyLog]) -> Vec<Habit> {
    let planned: HashMap<i64, bool> = logs.iter().map(|log| (log.habit_id, log.planned)).collect();
    habits
        .iter()
        .filter(|habit| planned.get(&habit.id).copied().unwrap_or(true))
        .cloned()
        .collect()
}

pub fn confirmation_text(token: &InteractionToken, habit_name: &str) -> String {
    match (token.phase, token.choice) {
        (Phase::Plan, Choice::Yes) => format!("👍 Planned: '{habit_name}'"),
        (Phase::Plan, Choice::No) => format!("⏭️ Skipped today: '{habit_name}'"),
        (Phase::Review, Choice::Yes) => format!("✅ Completed: '{habit_name}'"),
        (Phase::Review, Choice::No) => format!("❌ Not completed: '{habit_name}'"),
    }
}
