use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bugscribe_core::{CaptionPicker, Config, Coordinator, CoordinatorEvent, HttpChatService, Mode};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{AppEvent, EventHandler, Tui};

#[derive(Parser)]
#[command(name = "bugscribe")]
#[command(version, about = "Paste an error log, get a plain-language explanation and fix")]
struct Cli {
    /// Chat service base URL (overrides BUGSCRIBE_API_URL and the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name forwarded to the chat service
    #[arg(short, long)]
    model: Option<String>,

    /// Seed for caption choice and typing jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Write logs to this file (the terminal is busy with the UI)
    #[arg(long, env = "BUGSCRIBE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Save the effective settings to the config file and exit
    #[arg(long)]
    save_config: bool,
}

/// Keeps the non-blocking log writer flushing until exit
struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

fn setup_file_logging(path: &Path) -> Result<LogGuard> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bugscribe_core=info,bugscribe_tui=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(LogGuard { _guard: guard })
}

#[tokio::main]
async fn main() -> Result<()> {
    // A local .env may carry BUGSCRIBE_API_URL
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let _log_guard = cli.log_file.as_ref().map(|path| setup_file_logging(path)).transpose()?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };
    let config = Config::load_from(&config_path)?;
    tracing::debug!(path = %config_path.display(), "loaded config");

    let api_url = config.resolve_api_url(cli.api_url.as_deref());
    let model = cli.model.clone().or_else(|| config.model.clone());
    let pacing = config.pacing()?;

    if cli.save_config {
        let saved = Config {
            api_url: Some(api_url.clone()),
            model,
            ..config
        };
        saved.save_to(&config_path)?;
        println!("Saved settings to {}", config_path.display());
        return Ok(());
    }

    let mut seeds = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let captions = CaptionPicker::seeded(config.captions(), seeds.gen());
    let service = HttpChatService::new(&api_url, config.request_timeout())?;
    let coordinator = Coordinator::with_rng(
        Arc::new(service),
        pacing,
        captions,
        StdRng::seed_from_u64(seeds.gen()),
    )
    .with_model(model);

    tracing::info!(%api_url, "starting bugscribe");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut app = App::new(coordinator, api_url);

    let result = run(&mut terminal, &mut app).await;

    tui::restore()?;
    terminal.show_cursor()?;

    result
}

enum Step {
    Ui(Option<AppEvent>),
    Conversation(Option<CoordinatorEvent>),
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let spinning = app.mode() == Mode::AwaitingResponse;
        let step = tokio::select! {
            event = events.next(spinning) => Step::Ui(event),
            event = app.coordinator.next_event() => Step::Conversation(event),
        };

        match step {
            Step::Ui(Some(event)) => handler::handle_event(app, event),
            Step::Conversation(Some(event)) => app.apply_conversation_event(event),
            Step::Ui(None) | Step::Conversation(None) => break,
        }
    }

    Ok(())
}
