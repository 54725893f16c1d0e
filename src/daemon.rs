use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use teloxide::prelude::*;

use crate::bot::HabitBot;
use crate::config::Config;
use crate::error::{HabitTrackerError, Result};
use crate::habits::HabitStore;
use crate::identity::{ChatIdentity, CHAT_FILE};
use crate::interfaces::scheduler::DailyJob;
use crate::scheduler::DailyScheduler;
use crate::telegram::{inbound_event, TelegramGateway};

const SHUTDOWN_RETRY: Duration = Duration::from_millis(100);

/// Shared by the webhook router and the polling dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<HabitBot>,
    /// Commands carrying `@someone_else` are not ours.
    pub bot_username: String,
}

impl AppState {
    async fn apply(&self, update: &Update) {
        let Some(event) = inbound_event(update, &self.bot_username) else {
            return;
        };
        if let Err(err) = self.bot.handle_event(event).await {
            tracing::error!("failed to handle update: {err}");
        }
    }
}

struct MorningPlanJob {
    bot: Arc<HabitBot>,
}

#[async_trait::async_trait]
impl DailyJob for MorningPlanJob {
    fn name(&self) -> &str {
        "morning_plan"
    }

    async fn run(&self) -> Result<()> {
        self.bot.send_morning_plan().await
    }
}

struct EveningReviewJob {
    bot: Arc<HabitBot>,
}

#[async_trait::async_trait]
impl DailyJob for EveningReviewJob {
    fn name(&self) -> &str {
        "evening_review"
    }

    async fn run(&self) -> Result<()> {
        self.bot.send_evening_review().await
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(webhook)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// Telegram posts to whatever path the webhook URL carries, so every path
// other than /health lands here.
async fn webhook(State(state): State<AppState>, method: Method, body: Bytes) -> StatusCode {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            tracing::warn!("rejecting webhook body: {err}");
            return StatusCode::BAD_REQUEST;
        }
    };
    tracing::debug!(update_id = ?update.id, "webhook update received");

    state.apply(&update).await;
    StatusCode::OK
}

async fn handle_update(update: Update, state: AppState) -> ResponseResult<()> {
    state.apply(&update).await;
    Ok(())
}

pub fn register_jobs(
    scheduler: &mut DailyScheduler,
    bot: &Arc<HabitBot>,
    config: &Config,
) -> Result<()> {
    scheduler.schedule(
        &config.morning_time,
        Arc::new(MorningPlanJob { bot: bot.clone() }),
    )?;
    scheduler.schedule(
        &config.evening_time,
        Arc::new(EveningReviewJob { bot: bot.clone() }),
    )?;
    Ok(())
}

/// Long-polls Telegram until `shutdown` resolves. Updates already handed to a
/// handler are finished before this returns.
pub async fn run_polling<F>(telegram: &TelegramGateway, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut dispatcher =
        Dispatcher::builder(telegram.bot().clone(), dptree::endpoint(handle_update))
            .dependencies(dptree::deps![state])
            .build();

    let token = dispatcher.shutdown_token();
    let stopper = tokio::spawn(async move {
        shutdown.await;
        // The token refuses while the dispatcher is still starting up.
        loop {
            match token.shutdown() {
                Ok(stopped) => break stopped.await,
                Err(_) => tokio::time::sleep(SHUTDOWN_RETRY).await,
            }
        }
    });

    tracing::info!("running in polling mode");
    dispatcher.dispatch().await;
    stopper.abort();
    Ok(())
}

async fn run_webhook<F>(
    telegram: &TelegramGateway,
    state: AppState,
    webhook_url: &str,
    port: u16,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    telegram.set_webhook(webhook_url).await?;
    let info = telegram.webhook_info().await?;
    tracing::info!(
        url = ?info.url.as_ref().map(|url| url.as_str()),
        pending = info.pending_update_count,
        "running in webhook mode"
    );

    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HabitTrackerError::Runtime(e.to_string()))?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| HabitTrackerError::Runtime(e.to_string()))?;
    Ok(())
}

pub async fn run(config: Config) -> Result<()> {
    run_with_shutdown(config, shutdown_signal()).await
}

pub async fn run_with_shutdown<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let settings = config.bot_settings()?;
    let store = Arc::new(HabitStore::open(&config.data_dir)?);
    let identity = Arc::new(ChatIdentity::load(
        Path::new(&config.data_dir).join(CHAT_FILE),
        config.telegram_chat_id,
    )?);
    let telegram =
        TelegramGateway::with_api_url(&config.telegram_api_url, &config.telegram_bot_token)?;

    let bot_username = telegram.username().await?;
    tracing::info!("authorized on account {bot_username}");

    let bot = Arc::new(HabitBot::new(
        store,
        Arc::new(telegram.clone()),
        identity,
        settings,
    ));

    let mut scheduler = DailyScheduler::with_timezone(settings.timezone);
    register_jobs(&mut scheduler, &bot, &config)?;
    scheduler.start();

    let state = AppState {
        bot: bot.clone(),
        bot_username,
    };
    let result = match config.webhook_url.as_deref() {
        Some(url) => run_webhook(&telegram, state, url, config.port, shutdown).await,
        None => run_polling(&telegram, state, shutdown).await,
    };

    tracing::info!("shutting down");
    scheduler.stop().await;
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => futures::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
