use anyhow::Result;
use clap::Parser;
use docchat_core::{Config, HttpChatService};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::{App, Theme};
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "Chat with a PDF document through a retrieval service")]
#[command(version)]
struct Cli {
    /// Base URL of the chat service (overrides DOCCHAT_API_BASE_URL and the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Document to upload as soon as the chat opens
    document: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init_logging();

    let config = Config::load().unwrap_or_else(|e| {
        warn!("failed to load config, using defaults: {:#}", e);
        Config::default()
    });

    let base_url = cli.base_url.unwrap_or_else(|| config.resolved_base_url());
    let service = HttpChatService::with_timeout(&base_url, config.request_timeout())?;
    let base_url = service.base_url().to_string();
    let theme = config
        .theme
        .as_deref()
        .and_then(|t| t.parse::<Theme>().ok())
        .unwrap_or_default();
    info!("starting with service {}", base_url);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(Arc::new(service), base_url, theme, events.sender());

    if let Some(path) = cli.document {
        app.enter_chat();
        app.upload(&path).await;
    }

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else { break };
        handler::handle_event(app, event).await?;
    }
    Ok(())
}
