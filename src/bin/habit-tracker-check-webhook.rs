use habit_tracker::config::Config;
use habit_tracker::error::Result;
use habit_tracker::telegram::TelegramGateway;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let gateway =
        TelegramGateway::with_api_url(&config.telegram_api_url, &config.telegram_bot_token)?;
    let info = gateway.webhook_info().await?;

    println!("Webhook status");
    println!("{}", "─".repeat(40));
    let Some(url) = info.url else {
        println!("No webhook configured (long polling)");
        return Ok(());
    };
    println!("URL:             {url}");
    println!("Pending updates: {}", info.pending_update_count);
    if let Some(max) = info.max_connections {
        println!("Max connections: {max}");
    }
    match (info.last_error_date, info.last_error_message) {
        (Some(date), Some(message)) => println!("Last error:      {message} (at {date})"),
        _ => println!("No errors"),
    }
    Ok(())
}
