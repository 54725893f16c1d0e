use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use habit_tracker::config::Config;
use habit_tracker::daemon;
use habit_tracker::error::Result;
use habit_tracker::habits::HabitStore;

#[derive(Parser, Debug)]
#[command(name = "habit-tracker")]
#[command(about = "Telegram habit tracker with daily plan and review prompts")]
struct Cli {
    #[arg(long, help = "Read settings from this file instead of ./.env")]
    env_file: Option<PathBuf>,

    #[arg(long, help = "Override DATA_DIR")]
    data_dir: Option<String>,

    #[arg(long, help = "Override PORT")]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    Run,
    ConfigShow,
    Habits,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,habit_tracker=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let mut config = match &cli.env_file {
        Some(path) => Config::from_env_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => daemon::run(config).await,
        Commands::ConfigShow => {
            print_config(&config);
            Ok(())
        }
        Commands::Habits => {
            let store = HabitStore::open(&config.data_dir)?;
            let habits = store.list_habits();
            if habits.is_empty() {
                println!("No habits yet.");
            }
            for habit in habits {
                println!(
                    "{:>4}  {}  (added {})",
                    habit.id,
                    habit.name,
                    habit.created_at.format("%Y-%m-%d")
                );
            }
            Ok(())
        }
    }
}

fn print_config(config: &Config) {
    let token = &config.telegram_bot_token;
    let masked = match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "***".to_string(),
    };
    println!("telegram_bot_token = {masked}");
    println!(
        "telegram_chat_id   = {}",
        config
            .telegram_chat_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(first chat to write)".to_string())
    );
    println!("morning_time       = {}", config.morning_time);
    println!("evening_time       = {}", config.evening_time);
    println!("timezone           = {}", config.timezone);
    println!(
        "mode               = {}",
        match &config.webhook_url {
            Some(url) => format!("webhook ({url}, port {})", config.port),
            None => "polling".to_string(),
        }
    );
    println!("data_dir           = {}", config.data_dir);
}
