// Blogger Flow Bot - Entry Point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use blogger_flow_bot::services::remote::adapters::telegram::TelegramAdapter;
use blogger_flow_bot::services::remote::adapters::ChatAdapter;
use blogger_flow_bot::services::{BotGateway, ReminderSweep};
use blogger_flow_bot::storage::ConfigService;
use blogger_flow_bot::utils::paths::default_config_path;
use blogger_flow_bot::AppState;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "blogger-flow-bot", version, about = "Blogger collaboration Telegram bot")]
struct Cli {
    /// Config file (defaults to ~/.blogger-flow/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot (default)
    Run,
    /// Write all CSV exports to the data directory and exit
    Export,
    /// Write a default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cli.config).await,
        Commands::Export => export(cli.config),
        Commands::InitConfig => init_config(cli.config),
    }
}

/// Initialize logging with tracing
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let state = AppState::initialize(config_path).context("failed to initialize state")?;
    state
        .config()
        .validate_for_run()
        .map_err(anyhow::Error::msg)
        .context("config is not runnable")?;

    let adapter: Arc<dyn ChatAdapter> = Arc::new(TelegramAdapter::new(state.config())?);
    let workflow = Arc::new(state.workflow(adapter.clone()));
    let gateway = BotGateway::new(workflow, adapter.clone());

    let sweep = Arc::new(ReminderSweep::new(
        state.database(),
        adapter,
        Arc::new(state.config().clone()),
    ));
    let sweep_handle = sweep.spawn(gateway.cancel_token());

    let loop_handle = gateway.start().await?;
    info!("Bot is running, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Shutting down");

    gateway.stop().await?;
    let _ = loop_handle.await;
    let _ = sweep_handle.await;
    Ok(())
}

fn export(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let state = AppState::initialize(config_path)?;
    let files = state.exporter().export_all(&state.database())?;
    for file in files {
        println!("{} ({} rows)", file.path.display(), file.rows);
    }
    Ok(())
}

fn init_config(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => default_config_path()?,
    };
    ConfigService::init_file(&path)?;
    println!("Config written to {}", path.display());
    Ok(())
}
